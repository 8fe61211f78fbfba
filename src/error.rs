use thiserror::Error;

/// Top-level error type for the Cytolis simulation kernel.
#[derive(Debug, Error)]
pub enum CytolisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Numerics(#[from] NumericsError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while constructing reactions, rules, and solvers from
/// configuration. All are fatal at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown reaction id: {0}")]
    UnknownReaction(String),

    #[error("unknown compartment change id: {0}")]
    UnknownCompartmentChange(String),

    #[error("unknown direction rule id: {0}")]
    UnknownDirectionRule(String),

    #[error("unknown solver id: {0}")]
    UnknownSolver(String),

    #[error("unknown print mode: {0}")]
    UnknownPrintMode(u32),

    #[error("{id}: expected {expected} parameters, got {got}")]
    ParameterCount {
        id: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{id}: expected index shape {expected:?}, got {got:?}")]
    IndexShape {
        id: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("{id}: {what} column {column} is out of range (width {width})")]
    ColumnOutOfRange {
        id: &'static str,
        what: &'static str,
        column: usize,
        width: usize,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by topology edits and connectivity validation.
///
/// These are fatal: a violated invariant means the mesh can no longer be
/// trusted. The offending entity indices are carried for diagnostics.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("cell index {0} out of range")]
    CellNotFound(usize),

    #[error("wall index {0} out of range")]
    WallNotFound(usize),

    #[error("vertex index {0} out of range")]
    VertexNotFound(usize),

    #[error("cell {cell}: wall count {walls} != vertex count {vertices}")]
    WallVertexCountMismatch {
        cell: usize,
        walls: usize,
        vertices: usize,
    },

    #[error("wall {wall}: endpoint vertex {vertex} is not a vertex of cell {cell}")]
    EndpointOutsideCell {
        wall: usize,
        vertex: usize,
        cell: usize,
    },

    #[error("cell {cell}: vertex {vertex} is met by {count} cell walls, expected 2")]
    VertexWallDegree {
        cell: usize,
        vertex: usize,
        count: usize,
    },

    #[error("entity at table position {position} carries index {carried}")]
    IndexMismatch { position: usize, carried: usize },

    #[error("wall {wall}: identical endpoints or identical flanks (v {v1}/{v2})")]
    DegenerateWall { wall: usize, v1: usize, v2: usize },

    #[error("wall {wall}: orientation flag disagrees with cyclic order of cell {cell}")]
    OrientationMismatch { wall: usize, cell: usize },

    #[error("cell {cell}: division walls {wall1} and {wall2} do not bound two rings")]
    DivisionRingNotFound {
        cell: usize,
        wall1: usize,
        wall2: usize,
    },

    #[error("cell {cell}: division vertex coincides with an existing endpoint of wall {wall}")]
    DivisionVertexOnEndpoint { cell: usize, wall: usize },

    #[error("vertex {vertex}: expected exactly two incident walls, found {count}")]
    NotATwoVertex { vertex: usize, count: usize },

    #[error("walls {wall1} and {wall2} flank different cell pairs; cannot merge")]
    MergeFlankMismatch { wall1: usize, wall2: usize },

    #[error("invalid topology: {0}")]
    Invalid(String),
}

/// Errors raised by the numerical integrators.
#[derive(Debug, Error)]
pub enum NumericsError {
    #[error("adaptive step fell below h_min = {h_min} at t = {time} (h = {h})")]
    StepUnderflow { time: f64, h: f64, h_min: f64 },

    #[error("non-finite value encountered at t = {time}")]
    NonFinite { time: f64 },

    #[error("numerical failure: {0}")]
    Failed(String),
}

/// Errors raised while parsing init, model, and configuration files.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: unexpected end of input")]
    UnexpectedEof { line: usize },

    #[error("line {line}: expected {expected}, got `{got}`")]
    Token {
        line: usize,
        expected: &'static str,
        got: String,
    },

    #[error("line {line}: {what}")]
    Malformed { line: usize, what: String },

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for results using [`CytolisError`].
pub type Result<T> = std::result::Result<T, CytolisError>;
