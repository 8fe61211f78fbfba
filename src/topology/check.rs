use crate::error::{Result, TopologyError};

use super::Tissue;

impl Tissue {
    /// Verifies every structural invariant of the mesh. Pure: performs no
    /// mutation. Any violation is fatal to the simulation.
    ///
    /// Checked, in order: carried indices equal table positions; every
    /// reference lands inside its table; wall endpoints and flanks are
    /// non-degenerate and no wall is dangling; each cell has as many walls
    /// as vertices; each wall's endpoints appear in both flanking cells'
    /// vertex lists; each cell vertex is met by exactly two cell walls;
    /// orientation flags agree with the cyclic order.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, identifying the offending
    /// entity.
    pub fn check_connectivity(&self, verbose: bool) -> Result<()> {
        self.check_indices()?;
        self.check_references()?;
        self.check_walls()?;
        self.check_cells()?;
        self.check_back_references()?;
        if verbose {
            tracing::debug!(
                cells = self.num_cells(),
                walls = self.num_walls(),
                vertices = self.num_vertices(),
                "connectivity check passed"
            );
        }
        Ok(())
    }

    fn check_indices(&self) -> Result<()> {
        for (position, cell) in self.cells().iter().enumerate() {
            if cell.index != position {
                return Err(TopologyError::IndexMismatch {
                    position,
                    carried: cell.index,
                }
                .into());
            }
        }
        for (position, wall) in self.walls().iter().enumerate() {
            if wall.index != position {
                return Err(TopologyError::IndexMismatch {
                    position,
                    carried: wall.index,
                }
                .into());
            }
        }
        for (position, vertex) in self.vertices().iter().enumerate() {
            if vertex.index != position {
                return Err(TopologyError::IndexMismatch {
                    position,
                    carried: vertex.index,
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        let (nc, nw, nv) = (self.num_cells(), self.num_walls(), self.num_vertices());
        for cell in self.cells() {
            if let Some(&w) = cell.walls.iter().find(|&&w| w >= nw) {
                return Err(TopologyError::WallNotFound(w).into());
            }
            if let Some(&v) = cell.vertices.iter().find(|&&v| v >= nv) {
                return Err(TopologyError::VertexNotFound(v).into());
            }
        }
        for wall in self.walls() {
            if wall.vertex1 >= nv || wall.vertex2 >= nv {
                return Err(TopologyError::VertexNotFound(wall.vertex1.max(wall.vertex2)).into());
            }
            for flank in [wall.cell1, wall.cell2] {
                if let Some(c) = flank.cell() {
                    if c >= nc {
                        return Err(TopologyError::CellNotFound(c).into());
                    }
                }
            }
        }
        for vertex in self.vertices() {
            if let Some(&w) = vertex.walls.iter().find(|&&w| w >= nw) {
                return Err(TopologyError::WallNotFound(w).into());
            }
            if let Some(&c) = vertex.cells.iter().find(|&&c| c >= nc) {
                return Err(TopologyError::CellNotFound(c).into());
            }
        }
        Ok(())
    }

    fn check_walls(&self) -> Result<()> {
        for wall in self.walls() {
            if wall.vertex1 == wall.vertex2 || wall.cell1 == wall.cell2 {
                return Err(TopologyError::DegenerateWall {
                    wall: wall.index,
                    v1: wall.vertex1,
                    v2: wall.vertex2,
                }
                .into());
            }
            for flank in [wall.cell1, wall.cell2] {
                if let Some(c) = flank.cell() {
                    let cell = self.cell(c);
                    for v in [wall.vertex1, wall.vertex2] {
                        if cell.vertex_position(v).is_none() {
                            return Err(TopologyError::EndpointOutsideCell {
                                wall: wall.index,
                                vertex: v,
                                cell: c,
                            }
                            .into());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_cells(&self) -> Result<()> {
        for cell in self.cells() {
            if cell.walls.len() != cell.vertices.len() {
                return Err(TopologyError::WallVertexCountMismatch {
                    cell: cell.index,
                    walls: cell.walls.len(),
                    vertices: cell.vertices.len(),
                }
                .into());
            }
            for &v in &cell.vertices {
                let count = cell
                    .walls
                    .iter()
                    .filter(|&&w| self.wall(w).has_vertex(v))
                    .count();
                if count != 2 {
                    return Err(TopologyError::VertexWallDegree {
                        cell: cell.index,
                        vertex: v,
                        count,
                    }
                    .into());
                }
            }

            // Orientation flags must reproduce the cyclic order.
            let n = cell.walls.len();
            for k in 0..n {
                let wall = self.wall(cell.walls[k]);
                let sort = wall.sort_for(cell.index);
                let (a, b) = match sort {
                    1 => (wall.vertex1, wall.vertex2),
                    -1 => (wall.vertex2, wall.vertex1),
                    _ => {
                        return Err(TopologyError::OrientationMismatch {
                            wall: wall.index,
                            cell: cell.index,
                        }
                        .into())
                    }
                };
                if a != cell.vertices[k] || b != cell.vertices[(k + 1) % n] {
                    return Err(TopologyError::OrientationMismatch {
                        wall: wall.index,
                        cell: cell.index,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn check_back_references(&self) -> Result<()> {
        for wall in self.walls() {
            for v in [wall.vertex1, wall.vertex2] {
                if !self.vertex(v).walls.contains(&wall.index) {
                    return Err(TopologyError::Invalid(format!(
                        "vertex {v} does not list wall {}",
                        wall.index
                    ))
                    .into());
                }
            }
            for flank in [wall.cell1, wall.cell2] {
                if let Some(c) = flank.cell() {
                    if self.cell(c).wall_position(wall.index).is_none() {
                        return Err(TopologyError::Invalid(format!(
                            "cell {c} does not list wall {}",
                            wall.index
                        ))
                        .into());
                    }
                }
            }
        }
        for cell in self.cells() {
            for &v in &cell.vertices {
                if !self.vertex(v).cells.contains(&cell.index) {
                    return Err(TopologyError::Invalid(format!(
                        "vertex {v} does not list cell {}",
                        cell.index
                    ))
                    .into());
                }
            }
        }
        for vertex in self.vertices() {
            for &w in &vertex.walls {
                if !self.wall(w).has_vertex(vertex.index) {
                    return Err(TopologyError::Invalid(format!(
                        "wall {w} does not touch vertex {}",
                        vertex.index
                    ))
                    .into());
                }
            }
            for &c in &vertex.cells {
                if self.cell(c).vertex_position(vertex.index).is_none() {
                    return Err(TopologyError::Invalid(format!(
                        "cell {c} does not list vertex {}",
                        vertex.index
                    ))
                    .into());
                }
            }
        }
        for wall in self.walls() {
            if wall.is_dangling() {
                return Err(TopologyError::DegenerateWall {
                    wall: wall.index,
                    v1: wall.vertex1,
                    v2: wall.vertex2,
                }
                .into());
            }
        }
        Ok(())
    }
}
