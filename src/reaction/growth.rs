//! Growth and kinetic reactions: wall resting-length growth and
//! creation/decay of cell variables.

use std::collections::HashMap;

use crate::error::Result;
use crate::math::{row_distance, TOLERANCE};
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{
    check_cell_column, expect_index_levels, expect_index_shape, expect_parameters, Constructor,
    Reaction, ReactionSpec,
};

pub(super) fn register(table: &mut HashMap<&'static str, Constructor>) {
    table.insert(WallGrowth::ID, |spec| {
        Ok(Box::new(WallGrowth::from_spec(spec)?))
    });
    table.insert(WallGrowthStrain::ID, |spec| {
        Ok(Box::new(WallGrowthStrain::from_spec(spec)?))
    });
    table.insert(CreationConstant::ID, |spec| {
        Ok(Box::new(CreationConstant::from_spec(spec)?))
    });
    table.insert(CreationLinear::ID, |spec| {
        Ok(Box::new(CreationLinear::from_spec(spec)?))
    });
    table.insert(CreationHill::ID, |spec| {
        Ok(Box::new(CreationHill::from_spec(spec)?))
    });
    table.insert(DegradationOne::ID, |spec| {
        Ok(Box::new(DegradationOne::from_spec(spec)?))
    });
    table.insert(DegradationTwo::ID, |spec| {
        Ok(Box::new(DegradationTwo::from_spec(spec)?))
    });
}

/// Grows every wall's resting length: `dL0/dt = rate` when `mode` is 0,
/// `dL0/dt = rate * L0` (exponential, proportional to current resting
/// length) when `mode` is 1.
///
/// Parameters: `[rate, mode]`. Indices: none.
pub struct WallGrowth {
    rate: f64,
    proportional: bool,
}

impl WallGrowth {
    pub const ID: &'static str = "wall::growth";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            rate: spec.parameters[0],
            proportional: spec.parameters[1] > 0.5,
        })
    }
}

impl Reaction for WallGrowth {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for i in 0..tissue.num_walls() {
            let contribution = if self.proportional {
                self.rate * state.wall_data[i][0]
            } else {
                self.rate
            };
            derivs.wall_data[i][0] += contribution;
        }
    }
}

/// Strain-gated wall growth: walls stretched beyond `threshold` grow their
/// resting length toward the current length,
/// `dL0/dt = rate * (strain - threshold) * L0` for `strain > threshold`.
///
/// Parameters: `[rate, threshold]`. Indices: none.
pub struct WallGrowthStrain {
    rate: f64,
    threshold: f64,
}

impl WallGrowthStrain {
    pub const ID: &'static str = "wall::growth_strain";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            rate: spec.parameters[0],
            threshold: spec.parameters[1],
        })
    }
}

impl Reaction for WallGrowthStrain {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let rest = state.wall_data[wall.index][0];
            if rest < TOLERANCE {
                continue;
            }
            let length = row_distance(
                &state.vertex_data[wall.vertex1],
                &state.vertex_data[wall.vertex2],
            );
            let strain = (length - rest) / rest;
            if strain > self.threshold {
                derivs.wall_data[wall.index][0] += self.rate * (strain - self.threshold) * rest;
            }
        }
    }
}

/// Constant production of one cell variable: `dc/dt = k`.
///
/// Parameters: `[k]`. Indices: `[[column]]`.
pub struct CreationConstant {
    rate: f64,
    column: usize,
}

impl CreationConstant {
    pub const ID: &'static str = "cell::creation_constant";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[1])?;
        Ok(Self {
            rate: spec.parameters[0],
            column: spec.indices[0][0],
        })
    }
}

impl Reaction for CreationConstant {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, _state: &TissueState, derivs: &mut TissueState) {
        for i in 0..tissue.num_cells() {
            derivs.cell_data[i][self.column] += self.rate;
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.column, state)
    }
}

/// Production proportional to another cell variable:
/// `dc_out/dt = k * c_src`.
///
/// Parameters: `[k]`. Indices: `[[out_column, source_column]]`.
pub struct CreationLinear {
    rate: f64,
    out: usize,
    source: usize,
}

impl CreationLinear {
    pub const ID: &'static str = "cell::creation_linear";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[2])?;
        Ok(Self {
            rate: spec.parameters[0],
            out: spec.indices[0][0],
            source: spec.indices[0][1],
        })
    }
}

impl Reaction for CreationLinear {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for i in 0..tissue.num_cells() {
            derivs.cell_data[i][self.out] += self.rate * state.cell_data[i][self.source];
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.out, state)?;
        check_cell_column(Self::ID, self.source, state)
    }
}

/// Hill-activated production:
/// `dc_out/dt = v_max * s^n / (k_half^n + s^n)` with `s` the source
/// variable.
///
/// Parameters: `[v_max, k_half, n]`. Indices: `[[out_column, source_column]]`.
pub struct CreationHill {
    v_max: f64,
    k_half: f64,
    hill: f64,
    out: usize,
    source: usize,
}

impl CreationHill {
    pub const ID: &'static str = "cell::creation_hill";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 3)?;
        expect_index_shape(Self::ID, spec, &[2])?;
        Ok(Self {
            v_max: spec.parameters[0],
            k_half: spec.parameters[1],
            hill: spec.parameters[2],
            out: spec.indices[0][0],
            source: spec.indices[0][1],
        })
    }
}

impl Reaction for CreationHill {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        let kn = self.k_half.powf(self.hill);
        for i in 0..tissue.num_cells() {
            let s = state.cell_data[i][self.source].max(0.0);
            let sn = s.powf(self.hill);
            if sn + kn > TOLERANCE {
                derivs.cell_data[i][self.out] += self.v_max * sn / (kn + sn);
            }
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.out, state)?;
        check_cell_column(Self::ID, self.source, state)
    }
}

/// First-order decay of one cell variable: `dc/dt = -k c`.
///
/// Parameters: `[k]`. Indices: `[[column]]`.
pub struct DegradationOne {
    rate: f64,
    column: usize,
}

impl DegradationOne {
    pub const ID: &'static str = "cell::degradation";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[1])?;
        Ok(Self {
            rate: spec.parameters[0],
            column: spec.indices[0][0],
        })
    }
}

impl Reaction for DegradationOne {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for i in 0..tissue.num_cells() {
            derivs.cell_data[i][self.column] -= self.rate * state.cell_data[i][self.column];
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.column, state)
    }
}

/// Decay catalysed by a second variable: `dc/dt = -k c x`.
///
/// Parameters: `[k]`. Indices: `[[column, catalyst_column]]`.
pub struct DegradationTwo {
    rate: f64,
    column: usize,
    catalyst: usize,
}

impl DegradationTwo {
    pub const ID: &'static str = "cell::degradation_coupled";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[2])?;
        Ok(Self {
            rate: spec.parameters[0],
            column: spec.indices[0][0],
            catalyst: spec.indices[0][1],
        })
    }
}

impl Reaction for DegradationTwo {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for i in 0..tissue.num_cells() {
            let row = &state.cell_data[i];
            derivs.cell_data[i][self.column] -= self.rate * row[self.column] * row[self.catalyst];
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.column, state)?;
        check_cell_column(Self::ID, self.catalyst, state)
    }
}
