//! Compartment changes: the registered predicates that add or remove
//! cells between accepted integrator steps.

pub mod division;
pub mod removal;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{ConfigError, Result};
use crate::reaction::ReactionSpec;
use crate::state::TissueState;
use crate::topology::Tissue;

/// What a compartment change did to the cell table, steering the caller's
/// scan: an appended daughter is skipped for the rest of the pass, a
/// removal retries the same index, a multi-removal restarts the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompartmentOutcome {
    /// One new cell was appended.
    CellAdded,
    /// The flagged cell was removed.
    CellRemoved,
    /// More than one cell was removed.
    CellsRemoved(usize),
}

/// A topology-mutating rule scanned over all cells after each accepted
/// step.
pub trait CompartmentChange {
    /// Identifier this change registers under.
    fn id(&self) -> &'static str;

    /// Is this cell eligible for the change right now?
    fn flag(&self, tissue: &Tissue, cell: usize, state: &TissueState) -> bool;

    /// Performs the change on an eligible cell.
    ///
    /// # Errors
    ///
    /// Propagates topology-edit failures.
    fn perform(
        &mut self,
        tissue: &mut Tissue,
        cell: usize,
        state: &mut TissueState,
    ) -> Result<CompartmentOutcome>;
}

type Constructor = fn(&ReactionSpec) -> Result<Box<dyn CompartmentChange>>;

fn registry() -> &'static HashMap<&'static str, Constructor> {
    static REGISTRY: OnceLock<HashMap<&'static str, Constructor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut table: HashMap<&'static str, Constructor> = HashMap::new();
        division::register(&mut table);
        removal::register(&mut table);
        table
    })
}

/// Builds a compartment change from its spec via the registration table.
///
/// # Errors
///
/// Returns `ConfigError::UnknownCompartmentChange` for an unregistered id,
/// or the constructor's own validation failure.
pub fn create_compartment_change(spec: &ReactionSpec) -> Result<Box<dyn CompartmentChange>> {
    let constructor = registry()
        .get(spec.id.as_str())
        .ok_or_else(|| ConfigError::UnknownCompartmentChange(spec.id.clone()))?;
    constructor(spec)
}

/// All registered compartment-change ids, sorted.
#[must_use]
pub fn known_compartment_changes() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = registry().keys().copied().collect();
    ids.sort_unstable();
    ids
}
