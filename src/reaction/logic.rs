//! Gates and ad-hoc geometric constraint reactions.

use std::collections::HashMap;

use crate::error::{Result, TopologyError};
use crate::math::{position3, TOLERANCE};
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{
    add_vertex_force, check_cell_column, expect_index_levels, expect_index_shape,
    expect_parameters, Constructor, Reaction, ReactionSpec,
};

pub(super) fn register(table: &mut HashMap<&'static str, Constructor>) {
    table.insert(HoldVertex::ID, |spec| {
        Ok(Box::new(HoldVertex::from_spec(spec)?))
    });
    table.insert(CenterCom::ID, |spec| {
        Ok(Box::new(CenterCom::from_spec(spec)?))
    });
    table.insert(MoveVertexRadially::ID, |spec| {
        Ok(Box::new(MoveVertexRadially::from_spec(spec)?))
    });
    table.insert(ThresholdGate::ID, |spec| {
        Ok(Box::new(ThresholdGate::from_spec(spec)?))
    });
}

/// Pins the listed vertices: their positions are captured at initiation and
/// restored after every accepted step, overriding whatever the integrator
/// did to them.
///
/// Parameters: none. Indices: `[[vertex indices...]]`.
pub struct HoldVertex {
    vertices: Vec<usize>,
    anchors: Vec<Vec<f64>>,
}

impl HoldVertex {
    pub const ID: &'static str = "vertex::hold";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 0)?;
        expect_index_levels(Self::ID, spec, 1)?;
        Ok(Self {
            vertices: spec.indices[0].clone(),
            anchors: Vec::new(),
        })
    }
}

impl Reaction for HoldVertex {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn initiate(
        &mut self,
        tissue: &mut Tissue,
        state: &mut TissueState,
        _derivs: &mut TissueState,
    ) -> Result<()> {
        if let Some(&bad) = self.vertices.iter().find(|&&v| v >= tissue.num_vertices()) {
            return Err(TopologyError::VertexNotFound(bad).into());
        }
        self.anchors = self
            .vertices
            .iter()
            .map(|&v| state.vertex_data[v].clone())
            .collect();
        Ok(())
    }

    fn derivs(&self, _tissue: &Tissue, _state: &TissueState, _derivs: &mut TissueState) {}

    fn update(&mut self, _tissue: &mut Tissue, state: &mut TissueState, _step: f64) -> Result<()> {
        for (&v, anchor) in self.vertices.iter().zip(&self.anchors) {
            if v < state.vertex_data.len() {
                state.vertex_data[v].copy_from_slice(anchor);
            }
        }
        Ok(())
    }
}

/// Re-centers the tissue after every accepted step so the vertex center of
/// mass sits at the origin. Removes the drift that pressure and growth
/// otherwise accumulate.
///
/// Parameters: none. Indices: none.
pub struct CenterCom;

impl CenterCom {
    pub const ID: &'static str = "tissue::center_com";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 0)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self)
    }
}

impl Reaction for CenterCom {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, _tissue: &Tissue, _state: &TissueState, _derivs: &mut TissueState) {}

    fn update(&mut self, _tissue: &mut Tissue, state: &mut TissueState, _step: f64) -> Result<()> {
        let n = state.vertex_data.len();
        if n == 0 {
            return Ok(());
        }
        let dim = state.vertex_data[0].len();
        let mut mean = vec![0.0; dim];
        for row in &state.vertex_data {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }
        for row in &mut state.vertex_data {
            for (x, m) in row.iter_mut().zip(&mean) {
                *x -= m;
            }
        }
        Ok(())
    }
}

/// Pushes every vertex radially away from the origin:
/// `dx/dt = rate * x / |x|` when `power` is 0, `dx/dt = rate * x` when
/// `power` is 1.
///
/// Parameters: `[rate, power]`. Indices: none.
pub struct MoveVertexRadially {
    rate: f64,
    linear: bool,
}

impl MoveVertexRadially {
    pub const ID: &'static str = "vertex::move_radially";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            rate: spec.parameters[0],
            linear: spec.parameters[1] > 0.5,
        })
    }
}

impl Reaction for MoveVertexRadially {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for i in 0..tissue.num_vertices() {
            let p = position3(&state.vertex_data[i]);
            let r = p.norm();
            if r < TOLERANCE {
                continue;
            }
            let velocity = if self.linear {
                p * self.rate
            } else {
                p * (self.rate / r)
            };
            add_vertex_force(derivs, i, &velocity);
        }
    }
}

/// Writes a binary output variable from a thresholded input variable after
/// every accepted step: `out = on_value` where `in > threshold`, else
/// `off_value`.
///
/// Parameters: `[threshold, on_value, off_value]`.
/// Indices: `[[input_column], [output_column]]`.
pub struct ThresholdGate {
    threshold: f64,
    on_value: f64,
    off_value: f64,
    input: usize,
    output: usize,
}

impl ThresholdGate {
    pub const ID: &'static str = "cell::threshold_gate";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 3)?;
        expect_index_shape(Self::ID, spec, &[1, 1])?;
        Ok(Self {
            threshold: spec.parameters[0],
            on_value: spec.parameters[1],
            off_value: spec.parameters[2],
            input: spec.indices[0][0],
            output: spec.indices[1][0],
        })
    }
}

impl Reaction for ThresholdGate {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, _tissue: &Tissue, _state: &TissueState, _derivs: &mut TissueState) {}

    fn update(&mut self, tissue: &mut Tissue, state: &mut TissueState, _step: f64) -> Result<()> {
        for i in 0..tissue.num_cells() {
            state.cell_data[i][self.output] = if state.cell_data[i][self.input] > self.threshold {
                self.on_value
            } else {
                self.off_value
            };
        }
        Ok(())
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.input, state)?;
        check_cell_column(Self::ID, self.output, state)
    }
}
