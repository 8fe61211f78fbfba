//! Per-cell direction field: a unit vector plus a defined-flag written into
//! a contiguous slice of the cell data, updated after every accepted step
//! and reassigned to both daughters at division.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ConfigError, Result};
use crate::math::pca::{principal_axis_2d, PcaPlane};
use crate::math::{position3, Matrix3, Vector3, TOLERANCE};
use crate::reaction::ReactionSpec;
use crate::state::TissueState;
use crate::topology::Tissue;

/// Rule refreshing every cell's direction vector after an accepted step.
pub trait DirectionUpdateRule {
    /// Identifier this rule is selected by.
    fn id(&self) -> &'static str;

    /// Writes the direction field of every cell.
    ///
    /// # Errors
    ///
    /// Propagates geometric failures.
    fn update(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        step: f64,
    ) -> Result<()>;
}

/// Rule assigning the daughters' direction fields at division.
pub trait DirectionDivisionRule {
    /// Identifier this rule is selected by.
    fn id(&self) -> &'static str;

    /// Writes the direction fields of `parent` and `daughter` right after a
    /// division with separating-plane normal `normal`.
    ///
    /// # Errors
    ///
    /// Propagates geometric failures.
    fn divide(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        parent: usize,
        daughter: usize,
        normal: &[f64],
    ) -> Result<()>;
}

/// The direction subsystem: one update rule, one division rule, and the
/// cell-data column the field starts at. The layout is `dimension` vector
/// components followed by one defined-flag slot.
pub struct Direction {
    column: usize,
    update_rule: Box<dyn DirectionUpdateRule>,
    division_rule: Box<dyn DirectionDivisionRule>,
}

impl Direction {
    /// Assembles the subsystem from two rule specs; the field column comes
    /// from the update rule's single index level.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown rule ids or malformed specs.
    pub fn from_specs(update: &ReactionSpec, division: &ReactionSpec) -> Result<Self> {
        let column = *update
            .indices
            .first()
            .and_then(|level| level.first())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "direction rule {} must carry its field column as indices [[column]]",
                    update.id
                ))
            })?;
        Ok(Self {
            column,
            update_rule: create_update_rule(update)?,
            division_rule: create_division_rule(division)?,
        })
    }

    /// Start column of the direction field in each cell row.
    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Validates the field slice and seeds it via the update rule.
    ///
    /// # Errors
    ///
    /// Returns an error when a cell row cannot hold the field.
    pub fn initiate(&mut self, tissue: &Tissue, state: &mut TissueState) -> Result<()> {
        let needed = self.column + tissue.dimension() + 1;
        if let Some(row) = state.cell_data.iter().find(|row| row.len() < needed) {
            return Err(ConfigError::ColumnOutOfRange {
                id: self.update_rule.id(),
                what: "cell",
                column: needed - 1,
                width: row.len(),
            }
            .into());
        }
        self.update_rule.update(tissue, state, self.column, 0.0)
    }

    /// Refreshes the field after an accepted step of size `step`.
    ///
    /// # Errors
    ///
    /// Propagates rule failures.
    pub fn update(&mut self, tissue: &Tissue, state: &mut TissueState, step: f64) -> Result<()> {
        self.update_rule.update(tissue, state, self.column, step)
    }

    /// Division hook invoked by `Tissue::divide_cell`.
    ///
    /// # Errors
    ///
    /// Propagates rule failures.
    pub fn divide(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        parent: usize,
        daughter: usize,
        normal: &[f64],
    ) -> Result<()> {
        self.division_rule
            .divide(tissue, state, self.column, parent, daughter, normal)
    }
}

fn create_update_rule(spec: &ReactionSpec) -> Result<Box<dyn DirectionUpdateRule>> {
    match spec.id.as_str() {
        StaticDirection::ID => Ok(Box::new(StaticDirection::from_spec(spec)?)),
        LongestWallDirection::ID => Ok(Box::new(LongestWallDirection)),
        StrainDirection::ID => Ok(Box::new(StrainDirection)),
        PcaDirection::ID => Ok(Box::new(PcaDirection)),
        _ => Err(ConfigError::UnknownDirectionRule(spec.id.clone()).into()),
    }
}

fn create_division_rule(spec: &ReactionSpec) -> Result<Box<dyn DirectionDivisionRule>> {
    match spec.id.as_str() {
        ParallelDivisionDirection::ID => Ok(Box::new(ParallelDivisionDirection)),
        PerpendicularDivisionDirection::ID => Ok(Box::new(PerpendicularDivisionDirection)),
        RandomDivisionDirection::ID => Ok(Box::new(RandomDivisionDirection::from_spec(spec)?)),
        _ => Err(ConfigError::UnknownDirectionRule(spec.id.clone()).into()),
    }
}

/// Writes a direction vector into a cell row and raises the defined-flag.
fn write_direction(row: &mut [f64], column: usize, dim: usize, v: &Vector3) {
    let norm = v.norm();
    if norm < TOLERANCE {
        row[column + dim] = 0.0;
        return;
    }
    for d in 0..dim {
        row[column + d] = v[d] / norm;
    }
    row[column + dim] = 1.0;
}

/// Reads a cell's direction vector, `None` when the flag is down.
fn read_direction(row: &[f64], column: usize, dim: usize) -> Option<Vector3> {
    if row[column + dim] < 0.5 {
        return None;
    }
    Some(position3(&row[column..column + dim]))
}

/// Fixed axis for every cell; the field never changes after initiation.
///
/// Parameters: the axis components (2 or 3 values). Indices: `[[column]]`.
pub struct StaticDirection {
    axis: Vector3,
}

impl StaticDirection {
    pub const ID: &'static str = "direction::static";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        if spec.parameters.len() != 2 && spec.parameters.len() != 3 {
            return Err(ConfigError::ParameterCount {
                id: Self::ID,
                expected: 2,
                got: spec.parameters.len(),
            }
            .into());
        }
        Ok(Self {
            axis: position3(&spec.parameters),
        })
    }
}

impl DirectionUpdateRule for StaticDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn update(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        _step: f64,
    ) -> Result<()> {
        let dim = tissue.dimension();
        for row in &mut state.cell_data {
            write_direction(row, column, dim, &self.axis);
        }
        Ok(())
    }
}

/// Direction of each cell's geometrically longest wall.
pub struct LongestWallDirection;

impl LongestWallDirection {
    pub const ID: &'static str = "direction::longest_wall";
}

impl DirectionUpdateRule for LongestWallDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn update(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        _step: f64,
    ) -> Result<()> {
        let dim = tissue.dimension();
        for cell in tissue.cells() {
            let axis = cell
                .longest_wall(tissue.walls(), state)
                .map(|local| {
                    let wall = tissue.wall(cell.walls[local]);
                    position3(&state.vertex_data[wall.vertex2])
                        - position3(&state.vertex_data[wall.vertex1])
                })
                .unwrap_or_else(Vector3::zeros);
            write_direction(&mut state.cell_data[cell.index], column, dim, &axis);
        }
        Ok(())
    }
}

/// Principal strain axis: the dominant eigenvector of the wall-strain
/// tensor `sum strain_w * t_w (x) t_w` over the cell's walls.
pub struct StrainDirection;

impl StrainDirection {
    pub const ID: &'static str = "direction::strain";
}

impl DirectionUpdateRule for StrainDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn update(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        _step: f64,
    ) -> Result<()> {
        let dim = tissue.dimension();
        for cell in tissue.cells() {
            let mut tensor = Matrix3::zeros();
            for &w in &cell.walls {
                let wall = tissue.wall(w);
                let a = position3(&state.vertex_data[wall.vertex1]);
                let b = position3(&state.vertex_data[wall.vertex2]);
                let diff = b - a;
                let length = diff.norm();
                let rest = state.wall_data[w][0];
                if length < TOLERANCE || rest < TOLERANCE {
                    continue;
                }
                let t = diff / length;
                let strain = (length - rest) / rest;
                tensor += t * t.transpose() * strain;
            }

            let axis = if dim == 2 {
                principal_axis_2d(tensor[(0, 0)], tensor[(0, 1)], tensor[(1, 1)])
            } else {
                let eigen = nalgebra::SymmetricEigen::new(tensor);
                let mut best = 0;
                for i in 1..3 {
                    if eigen.eigenvalues[i] > eigen.eigenvalues[best] {
                        best = i;
                    }
                }
                eigen.eigenvectors.column(best).into_owned()
            };
            write_direction(&mut state.cell_data[cell.index], column, dim, &axis);
        }
        Ok(())
    }
}

/// Dominant PCA axis of the cell's vertex cloud; the in-plane long axis of
/// the cell.
pub struct PcaDirection;

impl PcaDirection {
    pub const ID: &'static str = "direction::pca";
}

impl DirectionUpdateRule for PcaDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn update(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        _step: f64,
    ) -> Result<()> {
        let dim = tissue.dimension();
        for cell in tissue.cells() {
            let axis = PcaPlane::fit(&cell.positions(state))
                .map(|plane| *plane.axis1())
                .unwrap_or_else(|_| Vector3::zeros());
            write_direction(&mut state.cell_data[cell.index], column, dim, &axis);
        }
        Ok(())
    }
}

/// Both daughters keep the parent's direction.
pub struct ParallelDivisionDirection;

impl ParallelDivisionDirection {
    pub const ID: &'static str = "direction_division::parallel";
}

impl DirectionDivisionRule for ParallelDivisionDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn divide(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        parent: usize,
        daughter: usize,
        _normal: &[f64],
    ) -> Result<()> {
        let dim = tissue.dimension();
        let field: Vec<f64> = state.cell_data[parent][column..=column + dim].to_vec();
        state.cell_data[daughter][column..=column + dim].copy_from_slice(&field);
        Ok(())
    }
}

/// The daughter's direction is the parent's rotated a quarter turn about
/// the cell normal; the parent keeps its own.
pub struct PerpendicularDivisionDirection;

impl PerpendicularDivisionDirection {
    pub const ID: &'static str = "direction_division::perpendicular";
}

impl DirectionDivisionRule for PerpendicularDivisionDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn divide(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        parent: usize,
        daughter: usize,
        _normal: &[f64],
    ) -> Result<()> {
        let dim = tissue.dimension();
        let Some(parent_dir) = read_direction(&state.cell_data[parent], column, dim) else {
            state.cell_data[daughter][column + dim] = 0.0;
            return Ok(());
        };
        let cell_normal = tissue.cell(daughter).normal(state, dim);
        let rotated = cell_normal.cross(&parent_dir);
        write_direction(&mut state.cell_data[daughter], column, dim, &rotated);
        Ok(())
    }
}

/// The daughter draws a fresh uniformly random in-plane direction.
///
/// Parameters: `[seed]`.
pub struct RandomDivisionDirection {
    rng: StdRng,
}

impl RandomDivisionDirection {
    pub const ID: &'static str = "direction_division::random";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        if spec.parameters.len() != 1 {
            return Err(ConfigError::ParameterCount {
                id: Self::ID,
                expected: 1,
                got: spec.parameters.len(),
            }
            .into());
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(spec.parameters[0] as u64),
        })
    }
}

impl DirectionDivisionRule for RandomDivisionDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn divide(
        &mut self,
        tissue: &Tissue,
        state: &mut TissueState,
        column: usize,
        _parent: usize,
        daughter: usize,
        _normal: &[f64],
    ) -> Result<()> {
        let dim = tissue.dimension();
        let angle = self.rng.random_range(0.0..std::f64::consts::TAU);
        let axis = if dim == 2 {
            Vector3::new(angle.cos(), angle.sin(), 0.0)
        } else {
            let z: f64 = self.rng.random_range(-1.0..1.0);
            let r = (1.0 - z * z).max(0.0).sqrt();
            Vector3::new(r * angle.cos(), r * angle.sin(), z)
        };
        write_direction(&mut state.cell_data[daughter], column, dim, &axis);
        Ok(())
    }
}
