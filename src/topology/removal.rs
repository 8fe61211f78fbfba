use crate::error::{Result, TopologyError};
use crate::math::{position3, TOLERANCE};
use crate::state::TissueState;

use super::{CellRef, Tissue};

impl Tissue {
    /// Removes a vertex met by exactly two walls, merging the walls into
    /// one. The surviving wall takes both resting lengths; the other wall
    /// and the vertex are removed. Inputs are validated before the first
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is out of range, has a wall degree
    /// other than two, or its two walls flank different cell pairs.
    pub fn remove_two_vertex(&mut self, state: &mut TissueState, vertex: usize) -> Result<()> {
        if vertex >= self.num_vertices() {
            return Err(TopologyError::VertexNotFound(vertex).into());
        }
        let incident = self.vertex(vertex).walls.clone();
        if incident.len() != 2 {
            return Err(TopologyError::NotATwoVertex {
                vertex,
                count: incident.len(),
            }
            .into());
        }
        let (wa, wb) = (incident[0], incident[1]);

        let same_flanks = {
            let a = self.wall(wa);
            let b = self.wall(wb);
            (a.cell1 == b.cell1 && a.cell2 == b.cell2)
                || (a.cell1 == b.cell2 && a.cell2 == b.cell1)
        };
        if !same_flanks {
            return Err(TopologyError::MergeFlankMismatch { wall1: wa, wall2: wb }.into());
        }

        let x = self.wall(wa).other_vertex(vertex).ok_or(
            TopologyError::WallNotFound(wa),
        )?;
        let y = self.wall(wb).other_vertex(vertex).ok_or(
            TopologyError::WallNotFound(wb),
        )?;
        if x == y {
            return Err(TopologyError::Invalid(format!(
                "removing vertex {vertex} would collapse walls {wa} and {wb} into a loop"
            ))
            .into());
        }

        // Merge: `wa` absorbs `wb`, spanning x -> y.
        state.wall_data[wa][0] += state.wall_data[wb][0];
        self.wall_mut(wa).replace_vertex(vertex, y);
        self.vertex_mut(y).replace_wall(wb, wa);

        let flanks = [self.wall(wa).cell1, self.wall(wa).cell2];
        for flank in flanks {
            if let Some(c) = flank.cell() {
                let cell = self.cell_mut(c);
                cell.vertices.retain(|&v| v != vertex);
                cell.walls.retain(|&w| w != wb);
                cell.invalidate_cache();
            }
        }

        tracing::debug!(vertex, merged_into = wa, "two-vertex removed");
        self.remove_wall(state, wb);
        self.remove_vertex(state, vertex);

        // The flank cells' lists lost an entry mid-ring; rebuild the cyclic
        // order before verifying.
        self.sort_cell_wall_and_cell_vertex()?;
        self.check_connectivity(false)?;
        Ok(())
    }

    /// Removes the listed cells, detaching their walls and vertices.
    ///
    /// Walls left with background on both sides are removed with the cell,
    /// as are vertices left with no incident wall. Returns the number of
    /// cells removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range or the mesh fails the
    /// connectivity check afterwards.
    pub fn remove_cells(&mut self, state: &mut TissueState, cells: &[usize]) -> Result<usize> {
        if let Some(&bad) = cells.iter().find(|&&c| c >= self.num_cells()) {
            return Err(TopologyError::CellNotFound(bad).into());
        }
        let mut order: Vec<usize> = cells.to_vec();
        order.sort_unstable();
        order.dedup();
        for &c in order.iter().rev() {
            self.detach_and_remove_cell(state, c);
        }
        self.check_connectivity(false)?;
        Ok(order.len())
    }

    /// Removes boundary cells: every cell touching the background whose
    /// center lies farther than `radius` from the origin (all boundary
    /// cells when `radius` is `None`). Repeats until no eligible cell
    /// remains, so calling it a second time never removes anything more.
    ///
    /// Returns the number of cells removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh fails the connectivity check afterwards.
    pub fn remove_epidermal_cells(
        &mut self,
        state: &mut TissueState,
        radius: Option<f64>,
    ) -> Result<usize> {
        let mut removed = 0;
        loop {
            let victims: Vec<usize> = self
                .cells()
                .iter()
                .filter(|cell| {
                    cell.is_epidermal(self.walls())
                        && radius.map_or(true, |r| cell.center(state).norm() > r)
                })
                .map(|cell| cell.index)
                .collect();
            if victims.is_empty() {
                break;
            }
            removed += self.remove_cells(state, &victims)?;
        }
        if removed > 0 {
            tracing::debug!(removed, "epidermal cells trimmed");
        }
        Ok(removed)
    }

    /// Removes boundary cells lagging behind the tissue's leading edge
    /// along `direction` by more than `threshold`. Runs to a fixpoint like
    /// [`Self::remove_epidermal_cells`].
    ///
    /// Returns the number of cells removed.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero direction, or if the mesh fails the
    /// connectivity check afterwards.
    pub fn remove_epidermal_cells_at_distance(
        &mut self,
        state: &mut TissueState,
        direction: &[f64],
        threshold: f64,
    ) -> Result<usize> {
        let dir = position3(direction);
        let len = dir.norm();
        if len < TOLERANCE {
            return Err(TopologyError::Invalid("zero trim direction".into()).into());
        }
        let dir = dir / len;

        let mut removed = 0;
        loop {
            let Some(front) = self
                .cells()
                .iter()
                .map(|cell| cell.center(state).dot(&dir))
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            else {
                break;
            };
            let victims: Vec<usize> = self
                .cells()
                .iter()
                .filter(|cell| {
                    cell.is_epidermal(self.walls())
                        && front - cell.center(state).dot(&dir) > threshold
                })
                .map(|cell| cell.index)
                .collect();
            if victims.is_empty() {
                break;
            }
            removed += self.remove_cells(state, &victims)?;
        }
        if removed > 0 {
            tracing::debug!(removed, "trailing cells trimmed");
        }
        Ok(removed)
    }

    /// Detaches cell `index` from its walls and vertices and removes it,
    /// along with any wall or vertex this leaves unreferenced.
    fn detach_and_remove_cell(&mut self, state: &mut TissueState, index: usize) {
        let walls = self.cell(index).walls.clone();
        let vertices = self.cell(index).vertices.clone();

        let mut dangling: Vec<usize> = Vec::new();
        for &w in &walls {
            let wall = self.wall_mut(w);
            wall.replace_cell(CellRef::Cell(index), CellRef::Background);
            if wall.is_dangling() {
                dangling.push(w);
            }
        }
        for &v in &vertices {
            self.vertex_mut(v).remove_cell(index);
        }

        dangling.sort_unstable();
        for &w in dangling.iter().rev() {
            let (v1, v2) = {
                let wall = self.wall(w);
                (wall.vertex1, wall.vertex2)
            };
            self.vertex_mut(v1).remove_wall(w);
            self.vertex_mut(v2).remove_wall(w);
            self.remove_wall(state, w);
        }

        let mut orphans: Vec<usize> = vertices
            .into_iter()
            .filter(|&v| self.vertex(v).is_isolated())
            .collect();
        orphans.sort_unstable();
        for &v in orphans.iter().rev() {
            self.remove_vertex(state, v);
        }

        self.remove_cell(state, index);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::topology::fixtures;

    #[test]
    fn two_vertex_removal_merges_walls() {
        let (mut tissue, mut state) = fixtures::single_square();
        let rest_before: f64 = state.wall_data.iter().map(|r| r[0]).sum();

        tissue.remove_two_vertex(&mut state, 0).unwrap();

        assert_eq!(tissue.num_vertices(), 3);
        assert_eq!(tissue.num_walls(), 3);
        assert_eq!(tissue.cell(0).num_walls(), 3);
        // Total resting length is conserved by the merge.
        let rest_after: f64 = state.wall_data.iter().map(|r| r[0]).sum();
        assert!((rest_after - rest_before).abs() < 1e-12);
    }

    #[test]
    fn two_vertex_removal_rejects_junction() {
        let (mut tissue, mut state) = fixtures::two_squares();
        // The shared wall's endpoints have three incident walls.
        let shared = tissue
            .walls()
            .iter()
            .find(|w| w.cell1.cell().is_some() && w.cell2.cell().is_some())
            .unwrap();
        let junction = shared.vertex1;
        assert!(tissue.remove_two_vertex(&mut state, junction).is_err());
    }

    #[test]
    fn removing_middle_cell_leaves_no_dangling_wall() {
        let (mut tissue, mut state) = fixtures::three_square_row();
        tissue.remove_cells(&mut state, &[1]).unwrap();

        assert_eq!(tissue.num_cells(), 2);
        assert!(tissue.walls().iter().all(|w| !w.is_dangling()));
        tissue.check_connectivity(false).unwrap();
        assert_eq!(state.cell_data.len(), 2);
        assert_eq!(state.wall_data.len(), tissue.num_walls());
    }

    #[test]
    fn removing_end_cell_drops_orphan_vertices() {
        let (mut tissue, mut state) = fixtures::three_square_row();
        let vertices_before = tissue.num_vertices();
        tissue.remove_cells(&mut state, &[2]).unwrap();

        // The two vertices used only by the removed cell are gone.
        assert_eq!(tissue.num_vertices(), vertices_before - 2);
        tissue.check_connectivity(false).unwrap();
    }

    #[test]
    fn epidermal_trim_with_infinite_radius_is_a_no_op() {
        let (mut tissue, mut state) = fixtures::three_square_row();
        let removed = tissue
            .remove_epidermal_cells(&mut state, Some(f64::INFINITY))
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(tissue.num_cells(), 3);
    }

    #[test]
    fn epidermal_trim_is_idempotent() {
        let (mut tissue, mut state) = fixtures::three_square_row();
        let cells_before = tissue.num_cells();

        let first = tissue
            .remove_epidermal_cells(&mut state, Some(2.0))
            .unwrap();
        assert!(tissue.num_cells() <= cells_before);
        tissue.check_connectivity(false).unwrap();

        let second = tissue
            .remove_epidermal_cells(&mut state, Some(2.0))
            .unwrap();
        assert_eq!(second, 0);
        let _ = first;
    }

    #[test]
    fn trim_at_distance_removes_trailing_cells() {
        let (mut tissue, mut state) = fixtures::three_square_row();
        // Leading edge is the rightmost cell (center x = 2.5); anything
        // lagging more than 1.2 behind it goes.
        let removed = tissue
            .remove_epidermal_cells_at_distance(&mut state, &[1.0, 0.0], 1.2)
            .unwrap();
        assert!(removed >= 1);
        tissue.check_connectivity(false).unwrap();

        let again = tissue
            .remove_epidermal_cells_at_distance(&mut state, &[1.0, 0.0], 1.2)
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn trim_rejects_zero_direction() {
        let (mut tissue, mut state) = fixtures::three_square_row();
        assert!(tissue
            .remove_epidermal_cells_at_distance(&mut state, &[0.0, 0.0], 1.0)
            .is_err());
    }
}
