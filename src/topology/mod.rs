pub mod cell;
pub mod check;
pub mod division;
pub mod removal;
pub mod sort;
pub mod vertex;
pub mod wall;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cell::Cell;
pub use vertex::Vertex;
pub use wall::{CellRef, Wall, WallSort};

use crate::compartment::{CompartmentChange, CompartmentOutcome};
use crate::direction::Direction;
use crate::error::{Result, TopologyError};
use crate::reaction::Reaction;
use crate::state::TissueState;

/// Raw wall connectivity as delivered by an init source: two endpoint
/// vertices and two flanking cells (either of which may be background).
#[derive(Debug, Clone, Copy)]
pub struct WallTopology {
    pub vertex1: usize,
    pub vertex2: usize,
    pub cell1: CellRef,
    pub cell2: CellRef,
}

/// Owner of all mesh entities and the authority for every topology edit.
///
/// Cells, walls, and vertices live in dense tables indexed by their stable
/// integer indices; the per-entity state matrices ([`TissueState`]) are kept
/// parallel to these tables. Entities hold only indices into sibling
/// tables. Removal is swap-with-last: the displaced entity's index and all
/// references to it are fixed up immediately, so `table[i].index == i`
/// holds at every observable point.
///
/// The tissue also owns the registered reactions, compartment changes, and
/// the optional direction subsystem, and drives their callbacks in the
/// order the solver contract requires.
#[derive(Default)]
pub struct Tissue {
    dimension: usize,
    cells: Vec<Cell>,
    walls: Vec<Wall>,
    vertices: Vec<Vertex>,
    reactions: Vec<Box<dyn Reaction>>,
    compartment_changes: Vec<Box<dyn CompartmentChange>>,
    direction: Option<Direction>,
}

impl std::fmt::Debug for Tissue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tissue")
            .field("dimension", &self.dimension)
            .field("cells", &self.cells.len())
            .field("walls", &self.walls.len())
            .field("vertices", &self.vertices.len())
            .field("reactions", &self.reactions.len())
            .field("compartment_changes", &self.compartment_changes.len())
            .finish()
    }
}

impl Tissue {
    /// Creates an empty tissue embedded in `dimension`-dimensional space.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Builds a tissue from raw connectivity plus pre-filled state matrices,
    /// then sorts every cell's cyclic order and verifies connectivity.
    ///
    /// Cell and vertex counts are taken from the state matrices; each wall
    /// record populates its own entity and contributes back-references to
    /// its endpoints and flanks.
    ///
    /// # Errors
    ///
    /// Returns an error if a record references an out-of-range entity, if a
    /// wall is degenerate, or if the assembled mesh violates connectivity.
    pub fn read_from_data(
        dimension: usize,
        wall_topology: &[WallTopology],
        state: &TissueState,
    ) -> Result<Self> {
        let num_cells = state.cell_data.len();
        let num_vertices = state.vertex_data.len();
        if wall_topology.len() != state.wall_data.len() {
            return Err(TopologyError::Invalid(format!(
                "{} wall records but {} wall data rows",
                wall_topology.len(),
                state.wall_data.len()
            ))
            .into());
        }

        let mut tissue = Self::new(dimension);
        tissue.cells = (0..num_cells).map(Cell::new).collect();
        tissue.vertices = state
            .vertex_data
            .iter()
            .enumerate()
            .map(|(i, row)| Vertex::new(i, row.clone()))
            .collect();

        for (i, record) in wall_topology.iter().enumerate() {
            if record.vertex1 >= num_vertices || record.vertex2 >= num_vertices {
                return Err(TopologyError::VertexNotFound(
                    record.vertex1.max(record.vertex2),
                )
                .into());
            }
            if record.vertex1 == record.vertex2 || record.cell1 == record.cell2 {
                return Err(TopologyError::DegenerateWall {
                    wall: i,
                    v1: record.vertex1,
                    v2: record.vertex2,
                }
                .into());
            }
            for flank in [record.cell1, record.cell2] {
                if let Some(c) = flank.cell() {
                    if c >= num_cells {
                        return Err(TopologyError::CellNotFound(c).into());
                    }
                }
            }

            let wall = Wall::new(i, record.vertex1, record.vertex2, record.cell1, record.cell2);
            for flank in [record.cell1, record.cell2] {
                if let Some(c) = flank.cell() {
                    tissue.cells[c].walls.push(i);
                    for v in [record.vertex1, record.vertex2] {
                        if !tissue.cells[c].vertices.contains(&v) {
                            tissue.cells[c].vertices.push(v);
                        }
                        if !tissue.vertices[v].cells.contains(&c) {
                            tissue.vertices[v].cells.push(c);
                        }
                    }
                }
            }
            tissue.vertices[record.vertex1].walls.push(i);
            tissue.vertices[record.vertex2].walls.push(i);
            tissue.walls.push(wall);
        }

        tissue.sort_cell_wall_and_cell_vertex()?;
        tissue.check_connectivity(false)?;
        Ok(tissue)
    }

    // --- Accessors ---

    /// Spatial dimension (2 or 3).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of cells.
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of walls.
    #[must_use]
    pub fn num_walls(&self) -> usize {
        self.walls.len()
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// The background sentinel shared by every wall side facing outside.
    #[must_use]
    pub fn background(&self) -> CellRef {
        CellRef::Background
    }

    /// Cell at table position `index`.
    #[must_use]
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// Wall at table position `index`.
    #[must_use]
    pub fn wall(&self, index: usize) -> &Wall {
        &self.walls[index]
    }

    /// Vertex at table position `index`.
    #[must_use]
    pub fn vertex(&self, index: usize) -> &Vertex {
        &self.vertices[index]
    }

    /// Mutable cell access.
    pub fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    /// Mutable wall access.
    pub fn wall_mut(&mut self, index: usize) -> &mut Wall {
        &mut self.walls[index]
    }

    /// Mutable vertex access.
    pub fn vertex_mut(&mut self, index: usize) -> &mut Vertex {
        &mut self.vertices[index]
    }

    /// Bounds-checked cell access.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range.
    pub fn try_cell(&self, index: usize) -> Result<&Cell> {
        self.cells
            .get(index)
            .ok_or_else(|| TopologyError::CellNotFound(index).into())
    }

    /// All cells, in table order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// All walls, in table order.
    #[must_use]
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// All vertices, in table order.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    // --- Low-level entity management ---
    //
    // These keep the entity tables and the state matrices parallel. The
    // high-level edits (division, removal) build on them and are the only
    // callers that may leave connectivity transiently incomplete.

    /// Appends a cell and its (empty) data row; returns its index.
    pub fn add_cell(&mut self, state: &mut TissueState, row: Vec<f64>) -> usize {
        let index = self.cells.len();
        self.cells.push(Cell::new(index));
        state.cell_data.push(row);
        index
    }

    /// Appends a wall and its data row; returns its index.
    pub fn add_wall(
        &mut self,
        state: &mut TissueState,
        vertex1: usize,
        vertex2: usize,
        cell1: CellRef,
        cell2: CellRef,
        row: Vec<f64>,
    ) -> usize {
        let index = self.walls.len();
        self.walls.push(Wall::new(index, vertex1, vertex2, cell1, cell2));
        state.wall_data.push(row);
        index
    }

    /// Appends a vertex and its position row; returns its index.
    pub fn add_vertex(&mut self, state: &mut TissueState, position: Vec<f64>) -> usize {
        let index = self.vertices.len();
        self.vertices.push(Vertex::new(index, position.clone()));
        state.vertex_data.push(position);
        index
    }

    /// Removes cell `index` by swap-with-last, fixing the displaced cell's
    /// index and every reference to it. The cell must already be detached
    /// from walls and vertices.
    pub fn remove_cell(&mut self, state: &mut TissueState, index: usize) {
        let last = self.cells.len() - 1;
        self.cells.swap_remove(index);
        state.cell_data.swap_remove(index);
        if index < last {
            self.cells[index].index = index;
            let walls: Vec<usize> = self.cells[index].walls.clone();
            let vertices: Vec<usize> = self.cells[index].vertices.clone();
            for w in walls {
                self.walls[w].replace_cell(CellRef::Cell(last), CellRef::Cell(index));
            }
            for v in vertices {
                self.vertices[v].replace_cell(last, index);
            }
        }
    }

    /// Removes wall `index` by swap-with-last, fixing the displaced wall's
    /// index and every reference to it. The wall must already be detached
    /// from cells and vertices.
    pub fn remove_wall(&mut self, state: &mut TissueState, index: usize) {
        let last = self.walls.len() - 1;
        self.walls.swap_remove(index);
        state.wall_data.swap_remove(index);
        if index < last {
            self.walls[index].index = index;
            let moved = self.walls[index].clone();
            for v in [moved.vertex1, moved.vertex2] {
                self.vertices[v].replace_wall(last, index);
            }
            for flank in [moved.cell1, moved.cell2] {
                if let Some(c) = flank.cell() {
                    self.cells[c].replace_wall(last, index);
                }
            }
        }
    }

    /// Removes vertex `index` by swap-with-last, fixing the displaced
    /// vertex's index and every reference to it. The vertex must already be
    /// detached from walls and cells.
    pub fn remove_vertex(&mut self, state: &mut TissueState, index: usize) {
        let last = self.vertices.len() - 1;
        self.vertices.swap_remove(index);
        state.vertex_data.swap_remove(index);
        if index < last {
            self.vertices[index].index = index;
            let walls: Vec<usize> = self.vertices[index].walls.clone();
            let cells: Vec<usize> = self.vertices[index].cells.clone();
            for w in walls {
                self.walls[w].replace_vertex(last, index);
            }
            for c in cells {
                self.cells[c].replace_vertex(last, index);
            }
        }
    }

    // --- Registries ---

    /// Registers a reaction.
    pub fn add_reaction(&mut self, reaction: Box<dyn Reaction>) {
        self.reactions.push(reaction);
    }

    /// Registers a compartment change.
    pub fn add_compartment_change(&mut self, change: Box<dyn CompartmentChange>) {
        self.compartment_changes.push(change);
    }

    /// Installs the direction subsystem.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = Some(direction);
    }

    /// Number of registered reactions.
    #[must_use]
    pub fn num_reactions(&self) -> usize {
        self.reactions.len()
    }

    /// Number of registered compartment changes.
    #[must_use]
    pub fn num_compartment_changes(&self) -> usize {
        self.compartment_changes.len()
    }

    /// Registered reactions, in registration order.
    #[must_use]
    pub fn reactions(&self) -> &[Box<dyn Reaction>] {
        &self.reactions
    }

    // --- Derivative assembly ---

    /// Zeroes `derivs`, then lets every registered reaction add its
    /// contribution. Reactions are order-independent at this level.
    pub fn derivs(&self, state: &TissueState, derivs: &mut TissueState) {
        derivs.zero();
        for reaction in &self.reactions {
            reaction.derivs(self, state, derivs);
        }
    }

    /// Like [`Self::derivs`], additionally accumulating each contribution's
    /// absolute magnitude into `scales` for the adaptive error estimate.
    pub fn derivs_with_abs(
        &self,
        state: &TissueState,
        derivs: &mut TissueState,
        scales: &mut TissueState,
    ) {
        derivs.zero();
        scales.zero();
        for reaction in &self.reactions {
            reaction.derivs_with_abs(self, state, derivs, scales);
        }
    }

    /// Streams every reaction's diagnostic dump into `out`, in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns I/O failures from the sink.
    pub fn print_reaction_state(
        &self,
        state: &TissueState,
        out: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        for reaction in &self.reactions {
            reaction.print_state(self, state, out)?;
        }
        Ok(())
    }

    // --- Lifecycle callbacks ---

    /// Runs every reaction's `initiate` once, before integration starts.
    ///
    /// # Errors
    ///
    /// Propagates the first reaction initiation failure.
    pub fn initiate_reactions(
        &mut self,
        state: &mut TissueState,
        derivs: &mut TissueState,
    ) -> Result<()> {
        let mut reactions = std::mem::take(&mut self.reactions);
        let mut outcome = Ok(());
        for reaction in &mut reactions {
            outcome = reaction.initiate(self, state, derivs);
            if outcome.is_err() {
                break;
            }
        }
        self.reactions = reactions;
        outcome?;
        self.validate_reaction_columns(state)
    }

    /// Runs every reaction's `update` after an accepted step of size `step`.
    ///
    /// # Errors
    ///
    /// Propagates the first reaction update failure.
    pub fn update_reactions(&mut self, state: &mut TissueState, step: f64) -> Result<()> {
        let mut reactions = std::mem::take(&mut self.reactions);
        let mut outcome = Ok(());
        for reaction in &mut reactions {
            outcome = reaction.update(self, state, step);
            if outcome.is_err() {
                break;
            }
        }
        self.reactions = reactions;
        outcome
    }

    /// Initiates the direction subsystem, when one is installed.
    ///
    /// # Errors
    ///
    /// Propagates a failure from the direction update rule.
    pub fn initiate_direction(&mut self, state: &mut TissueState) -> Result<()> {
        let Some(mut direction) = self.direction.take() else {
            return Ok(());
        };
        let outcome = direction.initiate(self, state);
        self.direction = Some(direction);
        outcome
    }

    /// Updates the per-cell direction field after an accepted step.
    ///
    /// # Errors
    ///
    /// Propagates a failure from the direction update rule.
    pub fn update_direction(&mut self, state: &mut TissueState, step: f64) -> Result<()> {
        let Some(mut direction) = self.direction.take() else {
            return Ok(());
        };
        let outcome = direction.update(self, state, step);
        self.direction = Some(direction);
        outcome
    }

    /// Assigns the daughters' direction fields after a division.
    ///
    /// # Errors
    ///
    /// Propagates a failure from the direction division rule.
    pub fn update_direction_division(
        &mut self,
        state: &mut TissueState,
        parent: usize,
        daughter: usize,
        normal: &[f64],
    ) -> Result<()> {
        let Some(mut direction) = self.direction.take() else {
            return Ok(());
        };
        let outcome = direction.divide(self, state, parent, daughter, normal);
        self.direction = Some(direction);
        outcome
    }

    /// Scans all cells against every registered compartment change, in
    /// registration order, applying divisions and removals.
    ///
    /// Within one pass: a removal retries the same index (the swapped-in
    /// cell now lives there), an appended daughter is skipped for the rest
    /// of the pass, and a multi-cell removal restarts the scan.
    ///
    /// Returns `true` when any topology mutation happened, so the solver
    /// can reallocate its stage buffers.
    ///
    /// # Errors
    ///
    /// Propagates the first compartment-change failure, and any column
    /// declaration invalidated by a resize.
    pub fn check_compartment_change(&mut self, state: &mut TissueState) -> Result<bool> {
        let mut changes = std::mem::take(&mut self.compartment_changes);
        let mut mutated = false;
        let mut outcome = Ok(());
        'scan: for change in &mut changes {
            let mut i = 0;
            let mut limit = self.cells.len();
            while i < limit {
                if !change.flag(self, i, state) {
                    i += 1;
                    continue;
                }
                match change.perform(self, i, state) {
                    Ok(CompartmentOutcome::CellAdded) => {
                        mutated = true;
                        i += 1;
                    }
                    Ok(CompartmentOutcome::CellRemoved) => {
                        mutated = true;
                        limit -= 1;
                    }
                    Ok(CompartmentOutcome::CellsRemoved(_)) => {
                        mutated = true;
                        i = 0;
                        limit = self.cells.len();
                    }
                    Err(e) => {
                        outcome = Err(e);
                        break 'scan;
                    }
                }
            }
        }
        self.compartment_changes = changes;
        outcome?;
        if mutated {
            self.validate_reaction_columns(state)?;
        }
        Ok(mutated)
    }

    /// Re-checks every reaction's declared columns against current matrix
    /// widths. Called after initiation and after every resize.
    ///
    /// # Errors
    ///
    /// Returns the first column declaration that no longer fits.
    pub fn validate_reaction_columns(&self, state: &TissueState) -> Result<()> {
        for reaction in &self.reactions {
            reaction.check_columns(state)?;
        }
        Ok(())
    }

    /// Copies `vertex_data` back into each vertex's own position field.
    /// Runs after every accepted integrator step.
    pub fn sync_vertex_positions(&mut self, state: &TissueState) {
        for (vertex, row) in self.vertices.iter_mut().zip(&state.vertex_data) {
            vertex.position.clear();
            vertex.position.extend_from_slice(row);
        }
    }

    /// Fits and caches the PCA plane of every 3D cell. Topology edits drop
    /// the caches; the solver refreshes them here before reactions read
    /// cell normals again. A no-op in 2D, where the plane is trivial.
    pub fn refresh_cell_planes(&mut self, state: &TissueState) {
        if self.dimension != 3 {
            return;
        }
        for i in 0..self.cells.len() {
            let points = self.cells[i].positions(state);
            self.cells[i].plane = crate::math::pca::PcaPlane::fit(&points).ok();
        }
    }

    // --- Center triangulation ---

    /// Appends a center-triangulation payload (centroid coordinates plus one
    /// interior edge length per cell vertex) to every cell that lacks one,
    /// and publishes the offset on the cell.
    pub fn init_center_triangulation(&mut self, state: &mut TissueState) {
        for i in 0..self.cells.len() {
            if self.cells[i].center_offset.is_none() {
                let offset = state.cell_data[i].len();
                self.cells[i].center_offset = Some(offset);
                self.write_center_payload(i, state);
            }
        }
    }

    /// Recomputes cell `index`'s center-triangulation payload from current
    /// vertex positions. Used at initiation and after divisions.
    pub(crate) fn write_center_payload(&mut self, index: usize, state: &mut TissueState) {
        let Some(offset) = self.cells[index].center_offset else {
            return;
        };
        let center = self.cells[index].center(state);
        let lengths: Vec<f64> = self.cells[index]
            .vertices
            .iter()
            .map(|&v| (crate::math::position3(&state.vertex_data[v]) - center).norm())
            .collect();

        let row = &mut state.cell_data[index];
        row.truncate(offset);
        for d in 0..self.dimension {
            row.push(center[d]);
        }
        row.extend(lengths);
    }
}
