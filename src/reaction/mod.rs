pub mod growth;
pub mod logic;
pub mod mechanics;
pub mod transport;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{ConfigError, Result};
use crate::state::TissueState;
use crate::topology::Tissue;

/// Configuration blob a reaction is constructed from: an identifier, a flat
/// list of real parameters, and a list-of-lists of state-matrix column
/// indices. The required sizes of both are part of each reaction's
/// contract and are validated at construction.
#[derive(Debug, Clone, Default)]
pub struct ReactionSpec {
    pub id: String,
    pub parameters: Vec<f64>,
    pub indices: Vec<Vec<usize>>,
}

impl ReactionSpec {
    /// Shorthand used by tests and programmatic model assembly.
    #[must_use]
    pub fn new(id: &str, parameters: Vec<f64>, indices: Vec<Vec<usize>>) -> Self {
        Self {
            id: id.to_string(),
            parameters,
            indices,
        }
    }
}

/// A derivative/update contributor plugged into the tissue.
///
/// `derivs` must only add into the derivative matrices: no reads of other
/// contributions, no topology mutation, no resizing. Everything stateful
/// happens in `initiate` (once, before integration) and `update` (after
/// each accepted step, where topology edits through [`Tissue`] are allowed).
pub trait Reaction {
    /// Identifier this reaction registers under.
    fn id(&self) -> &'static str;

    /// One-time setup before integration; may resize `cell_data` (e.g. to
    /// append a center-triangulation payload).
    ///
    /// # Errors
    ///
    /// Returns an error when the tissue or state cannot support the
    /// reaction's declared columns.
    fn initiate(
        &mut self,
        _tissue: &mut Tissue,
        _state: &mut TissueState,
        _derivs: &mut TissueState,
    ) -> Result<()> {
        Ok(())
    }

    /// Adds this reaction's contribution into `derivs`.
    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState);

    /// Like [`Self::derivs`], additionally adding the absolute magnitude of
    /// every contribution into `scales`. The default evaluates into a
    /// scratch buffer and feeds both, which is exact for any reaction;
    /// implementations whose terms cannot cancel may skip the scratch.
    fn derivs_with_abs(
        &self,
        tissue: &Tissue,
        state: &TissueState,
        derivs: &mut TissueState,
        scales: &mut TissueState,
    ) {
        let mut scratch = derivs.zeroed_like();
        self.derivs(tissue, state, &mut scratch);
        derivs.add(&scratch);
        scales.add_abs(&scratch);
    }

    /// Called after each accepted integrator step of size `step`; may
    /// mutate topology through the tissue's APIs.
    ///
    /// # Errors
    ///
    /// Propagates failures from topology edits.
    fn update(&mut self, _tissue: &mut Tissue, _state: &mut TissueState, _step: f64) -> Result<()> {
        Ok(())
    }

    /// Emits reaction-local diagnostics.
    ///
    /// # Errors
    ///
    /// Returns I/O failures from the sink.
    fn print_state(
        &self,
        _tissue: &Tissue,
        _state: &TissueState,
        _out: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        Ok(())
    }

    /// Re-validates the reaction's declared columns against current matrix
    /// widths. Called after initiation and after every matrix resize.
    ///
    /// # Errors
    ///
    /// Returns the first declared column that no longer fits.
    fn check_columns(&self, _state: &TissueState) -> Result<()> {
        Ok(())
    }
}

type Constructor = fn(&ReactionSpec) -> Result<Box<dyn Reaction>>;

fn registry() -> &'static HashMap<&'static str, Constructor> {
    static REGISTRY: OnceLock<HashMap<&'static str, Constructor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut table: HashMap<&'static str, Constructor> = HashMap::new();
        mechanics::register(&mut table);
        growth::register(&mut table);
        transport::register(&mut table);
        logic::register(&mut table);
        table
    })
}

/// Builds a reaction from its spec via the registration table.
///
/// # Errors
///
/// Returns `ConfigError::UnknownReaction` for an unregistered id, or the
/// constructor's own validation failure.
pub fn create_reaction(spec: &ReactionSpec) -> Result<Box<dyn Reaction>> {
    let constructor = registry()
        .get(spec.id.as_str())
        .ok_or_else(|| ConfigError::UnknownReaction(spec.id.clone()))?;
    constructor(spec)
}

/// All registered reaction ids, sorted.
#[must_use]
pub fn known_reactions() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = registry().keys().copied().collect();
    ids.sort_unstable();
    ids
}

// --- Construction-time validation helpers shared by all reactions ---

pub(crate) fn expect_parameters(
    id: &'static str,
    spec: &ReactionSpec,
    expected: usize,
) -> Result<()> {
    if spec.parameters.len() != expected {
        return Err(ConfigError::ParameterCount {
            id,
            expected,
            got: spec.parameters.len(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn expect_index_shape(
    id: &'static str,
    spec: &ReactionSpec,
    expected: &[usize],
) -> Result<()> {
    let got: Vec<usize> = spec.indices.iter().map(Vec::len).collect();
    if got != expected {
        return Err(ConfigError::IndexShape {
            id,
            expected: expected.to_vec(),
            got,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn expect_index_levels(
    id: &'static str,
    spec: &ReactionSpec,
    expected: usize,
) -> Result<()> {
    if spec.indices.len() != expected {
        return Err(ConfigError::IndexShape {
            id,
            expected: vec![expected],
            got: spec.indices.iter().map(Vec::len).collect(),
        }
        .into());
    }
    Ok(())
}

/// Narrowest cell row; declared cell columns must fit every row.
pub(crate) fn min_cell_width(state: &TissueState) -> usize {
    state.cell_data.iter().map(Vec::len).min().unwrap_or(0)
}

/// Narrowest wall row.
pub(crate) fn min_wall_width(state: &TissueState) -> usize {
    state.wall_data.iter().map(Vec::len).min().unwrap_or(0)
}

pub(crate) fn check_cell_column(
    id: &'static str,
    column: usize,
    state: &TissueState,
) -> Result<()> {
    let width = min_cell_width(state);
    if !state.cell_data.is_empty() && column >= width {
        return Err(ConfigError::ColumnOutOfRange {
            id,
            what: "cell",
            column,
            width,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn check_wall_column(
    id: &'static str,
    column: usize,
    state: &TissueState,
) -> Result<()> {
    let width = min_wall_width(state);
    if !state.wall_data.is_empty() && column >= width {
        return Err(ConfigError::ColumnOutOfRange {
            id,
            what: "wall",
            column,
            width,
        }
        .into());
    }
    Ok(())
}

/// Adds a spatial force into a vertex derivative row, truncated to the
/// row's dimension.
pub(crate) fn add_vertex_force(
    derivs: &mut TissueState,
    vertex: usize,
    force: &crate::math::Vector3,
) {
    let row = &mut derivs.vertex_data[vertex];
    for (d, slot) in row.iter_mut().enumerate() {
        *slot += force[d];
    }
}
