//! Removal rules: cull cells past geometric thresholds.

use std::collections::HashMap;

use crate::error::{ConfigError, Result};
use crate::reaction::ReactionSpec;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{CompartmentChange, CompartmentOutcome, Constructor};

pub(super) fn register(table: &mut HashMap<&'static str, Constructor>) {
    table.insert(RemovalOutsideRadius::ID, |spec| {
        Ok(Box::new(RemovalOutsideRadius::from_spec(spec)?))
    });
    table.insert(RemovalOutsidePosition::ID, |spec| {
        Ok(Box::new(RemovalOutsidePosition::from_spec(spec)?))
    });
}

fn remove_one(
    tissue: &mut Tissue,
    state: &mut TissueState,
    cell: usize,
) -> Result<CompartmentOutcome> {
    tissue.remove_cells(state, &[cell])?;
    Ok(CompartmentOutcome::CellRemoved)
}

/// Removes any cell whose center drifts farther than `radius` from the
/// origin.
///
/// Parameters: `[radius]`. Indices: none.
pub struct RemovalOutsideRadius {
    radius: f64,
}

impl RemovalOutsideRadius {
    pub const ID: &'static str = "removal::radius";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        crate::reaction::expect_parameters(Self::ID, spec, 1)?;
        crate::reaction::expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            radius: spec.parameters[0],
        })
    }
}

impl CompartmentChange for RemovalOutsideRadius {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn flag(&self, tissue: &Tissue, cell: usize, state: &TissueState) -> bool {
        tissue.cell(cell).center(state).norm() > self.radius
    }

    fn perform(
        &mut self,
        tissue: &mut Tissue,
        cell: usize,
        state: &mut TissueState,
    ) -> Result<CompartmentOutcome> {
        tracing::debug!(cell, radius = self.radius, "radius removal");
        remove_one(tissue, state, cell)
    }
}

/// Removes any cell whose center passes a coordinate threshold:
/// `sign * (center[axis] - threshold) > 0`.
///
/// Parameters: `[axis, threshold, sign]`. Indices: none.
pub struct RemovalOutsidePosition {
    axis: usize,
    threshold: f64,
    sign: f64,
}

impl RemovalOutsidePosition {
    pub const ID: &'static str = "removal::position";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count, index shape, or axis.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        crate::reaction::expect_parameters(Self::ID, spec, 3)?;
        crate::reaction::expect_index_levels(Self::ID, spec, 0)?;
        let axis = spec.parameters[0] as usize;
        if axis > 2 {
            return Err(ConfigError::Invalid(format!(
                "{}: axis {axis} out of range",
                Self::ID
            ))
            .into());
        }
        Ok(Self {
            axis,
            threshold: spec.parameters[1],
            sign: if spec.parameters[2] < 0.0 { -1.0 } else { 1.0 },
        })
    }
}

impl CompartmentChange for RemovalOutsidePosition {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn flag(&self, tissue: &Tissue, cell: usize, state: &TissueState) -> bool {
        let center = tissue.cell(cell).center(state);
        self.sign * (center[self.axis] - self.threshold) > 0.0
    }

    fn perform(
        &mut self,
        tissue: &mut Tissue,
        cell: usize,
        state: &mut TissueState,
    ) -> Result<CompartmentOutcome> {
        tracing::debug!(cell, axis = self.axis, "position removal");
        remove_one(tissue, state, cell)
    }
}
