use std::collections::VecDeque;

use crate::error::{Result, TopologyError};

use super::{CellRef, Tissue, WallSort};

impl Tissue {
    /// Reorders every cell's wall and vertex lists into matching cyclic
    /// order and sets each wall's per-side orientation flag.
    ///
    /// Walks the tissue breadth-first across wall-shared neighbors so that
    /// adjacent cells traverse their common wall in opposite directions,
    /// giving the whole mesh one consistent orientation per connected
    /// component. After this, `wall(k)` runs from `vertex(k)` to
    /// `vertex(k + 1)` modulo the sort flag, for every cell.
    ///
    /// Applying the sort twice yields the same ordering as applying it once.
    ///
    /// # Errors
    ///
    /// Returns an error if any cell's walls do not form a single closed
    /// ring.
    pub fn sort_cell_wall_and_cell_vertex(&mut self) -> Result<()> {
        let num_cells = self.num_cells();
        let mut visited = vec![false; num_cells];

        for root in 0..num_cells {
            if visited[root] {
                continue;
            }
            self.sort_single_cell(root, None)?;
            visited[root] = true;

            let mut queue = VecDeque::from([root]);
            while let Some(current) = queue.pop_front() {
                let walls = self.cell(current).walls.clone();
                for w in walls {
                    let Some(CellRef::Cell(neighbor)) = self.wall(w).other_cell(current) else {
                        continue;
                    };
                    if visited[neighbor] {
                        continue;
                    }
                    // The neighbor must run the shared wall the other way.
                    let entry = -self.wall(w).sort_for(current);
                    self.sort_single_cell(neighbor, Some((w, entry)))?;
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        Ok(())
    }

    /// Rebuilds one cell's cyclic order by chaining its walls end to end.
    ///
    /// `start` pins the first wall and the direction to traverse it; `None`
    /// keeps the cell's current first wall in its intrinsic direction.
    fn sort_single_cell(&mut self, cell: usize, start: Option<(usize, WallSort)>) -> Result<()> {
        let cell_walls = self.cell(cell).walls.clone();
        let ring_len = cell_walls.len();
        if ring_len < 2 {
            return Err(TopologyError::Invalid(format!(
                "cell {cell} has {ring_len} walls; cannot form a ring"
            ))
            .into());
        }

        let (first_wall, first_sort) = match start {
            Some((w, s)) if s != 0 => (w, s),
            _ => (*cell_walls.first().unwrap_or(&0), 1),
        };
        if !cell_walls.contains(&first_wall) {
            return Err(TopologyError::Invalid(format!(
                "wall {first_wall} is not a wall of cell {cell}"
            ))
            .into());
        }

        let mut ordered_walls = Vec::with_capacity(ring_len);
        let mut ordered_vertices = Vec::with_capacity(ring_len);

        let mut current_wall = first_wall;
        let (start_vertex, mut current_vertex) = {
            let w = self.wall(first_wall);
            if first_sort > 0 {
                (w.vertex1, w.vertex2)
            } else {
                (w.vertex2, w.vertex1)
            }
        };
        ordered_walls.push(first_wall);
        ordered_vertices.push(start_vertex);
        self.wall_mut(first_wall).set_sort_for(cell, first_sort);

        while current_vertex != start_vertex {
            if ordered_walls.len() > ring_len {
                return Err(TopologyError::Invalid(format!(
                    "cell {cell}: wall chain does not close"
                ))
                .into());
            }
            ordered_vertices.push(current_vertex);

            let mut candidates = cell_walls
                .iter()
                .copied()
                .filter(|&w| w != current_wall && self.wall(w).has_vertex(current_vertex));
            let next = candidates.next().ok_or(TopologyError::VertexWallDegree {
                cell,
                vertex: current_vertex,
                count: 1,
            })?;
            if candidates.next().is_some() {
                return Err(TopologyError::VertexWallDegree {
                    cell,
                    vertex: current_vertex,
                    count: 3,
                }
                .into());
            }

            let sort: WallSort = if self.wall(next).vertex1 == current_vertex {
                1
            } else {
                -1
            };
            self.wall_mut(next).set_sort_for(cell, sort);
            ordered_walls.push(next);
            current_vertex = self
                .wall(next)
                .other_vertex(current_vertex)
                .unwrap_or(start_vertex);
            current_wall = next;
        }

        if ordered_walls.len() != ring_len || ordered_vertices.len() != ring_len {
            return Err(TopologyError::Invalid(format!(
                "cell {cell}: ring closed after {} of {ring_len} walls",
                ordered_walls.len()
            ))
            .into());
        }

        let c = self.cell_mut(cell);
        c.walls = ordered_walls;
        c.vertices = ordered_vertices;
        c.invalidate_cache();
        Ok(())
    }
}
