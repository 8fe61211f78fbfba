use crate::error::{Result, TopologyError};
use crate::math::{position3, row_distance, TOLERANCE};
use crate::state::TissueState;

use super::{CellRef, Tissue};

impl Tissue {
    /// Divides cell `cell_index` by a new wall crossing two of its walls.
    ///
    /// `wall1` and `wall2` are local positions in the cell's cyclic wall
    /// list; `p1` and `p2` are the new vertex positions on those walls.
    /// Each point is projected onto its wall and, when `snap_fraction` is
    /// positive, snapped away from the endpoints so no degenerate sliver
    /// wall is created. The columns listed in `volume_coupled` are
    /// partitioned between the daughters in proportion to their areas.
    ///
    /// One new cell, two new vertices, and three new walls are appended:
    /// the separator plus the outer halves of the two cut walls. The
    /// daughter inherits a copy of the parent's variable row. All inputs
    /// are validated before the first mutation, so a failed division leaves
    /// the tissue untouched.
    ///
    /// Returns the daughter's cell index.
    ///
    /// # Errors
    ///
    /// Returns an error if the wall pair is invalid, a projected vertex
    /// lands on an existing endpoint, a partitioned column is out of range,
    /// or the stitched mesh fails the connectivity check.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub fn divide_cell(
        &mut self,
        state: &mut TissueState,
        cell_index: usize,
        wall1: usize,
        wall2: usize,
        p1: &[f64],
        p2: &[f64],
        normal: &[f64],
        volume_coupled: &[usize],
        snap_fraction: f64,
    ) -> Result<usize> {
        // -- Validate everything up front; no mutation before this block ends.
        if cell_index >= self.num_cells() {
            return Err(TopologyError::CellNotFound(cell_index).into());
        }
        let n = self.cell(cell_index).num_walls();
        if wall1 == wall2 || wall1 >= n || wall2 >= n || n < 3 {
            return Err(TopologyError::DivisionRingNotFound {
                cell: cell_index,
                wall1,
                wall2,
            }
            .into());
        }

        let old_walls = self.cell(cell_index).walls.clone();
        let old_vertices = self.cell(cell_index).vertices.clone();
        let g1 = old_walls[wall1];
        let g2 = old_walls[wall2];

        // Endpoints in the cell's traversal order.
        let a = old_vertices[wall1];
        let b = old_vertices[(wall1 + 1) % n];
        let c = old_vertices[wall2];
        let d = old_vertices[(wall2 + 1) % n];

        let t1 = project_fraction(state, a, b, p1, snap_fraction)
            .ok_or(TopologyError::DivisionVertexOnEndpoint {
                cell: cell_index,
                wall: g1,
            })?;
        let t2 = project_fraction(state, c, d, p2, snap_fraction)
            .ok_or(TopologyError::DivisionVertexOnEndpoint {
                cell: cell_index,
                wall: g2,
            })?;

        let base_width = self
            .cell(cell_index)
            .center_offset
            .unwrap_or(state.cell_data[cell_index].len());
        if let Some(&col) = volume_coupled.iter().find(|&&col| col >= base_width) {
            return Err(TopologyError::Invalid(format!(
                "volume-coupled column {col} exceeds cell variable width {base_width}"
            ))
            .into());
        }

        let q1 = lerp_rows(&state.vertex_data[a], &state.vertex_data[b], t1);
        let q2 = lerp_rows(&state.vertex_data[c], &state.vertex_data[d], t2);

        // -- Append the daughter, the two cut-points, and the three walls.
        let parent_row = state.cell_data[cell_index].clone();
        let daughter = self.add_cell(state, parent_row);
        let v1_new = self.add_vertex(state, q1.clone());
        let v2_new = self.add_vertex(state, q2.clone());

        let g1_row = state.wall_data[g1].clone();
        let g2_row = state.wall_data[g2].clone();
        let g1_rest = g1_row[0];
        let g2_rest = g2_row[0];

        let (w1_cell1, w1_cell2) = (self.wall(g1).cell1, self.wall(g1).cell2);
        let (w2_cell1, w2_cell2) = (self.wall(g2).cell1, self.wall(g2).cell2);

        let mut n1_row = g1_row;
        n1_row[0] = g1_rest * (1.0 - t1);
        let n1 = self.add_wall(state, v1_new, b, w1_cell1, w1_cell2, n1_row);

        let mut n2_row = g2_row;
        n2_row[0] = g2_rest * (1.0 - t2);
        let n2 = self.add_wall(state, v2_new, d, w2_cell1, w2_cell2, n2_row);

        let mut wn_row = vec![0.0; state.wall_data[g1].len()];
        wn_row[0] = row_distance(&q1, &q2);
        let wn = self.add_wall(
            state,
            v1_new,
            v2_new,
            CellRef::Cell(cell_index),
            CellRef::Cell(daughter),
            wn_row,
        );

        // -- Split the cut walls: the halves toward `a` and `c` keep their
        // indices; their displaced endpoints move to the new halves.
        state.wall_data[g1][0] = g1_rest * t1;
        self.wall_mut(g1).replace_vertex(b, v1_new);
        state.wall_data[g2][0] = g2_rest * t2;
        self.wall_mut(g2).replace_vertex(d, v2_new);

        // -- Compute the two rings by walking the old cyclic order.
        let mut c_walls = vec![n1];
        let mut c_vertices = vec![v1_new];
        let mut k = (wall1 + 1) % n;
        loop {
            c_vertices.push(old_vertices[k]);
            if k == wall2 {
                break;
            }
            c_walls.push(old_walls[k]);
            k = (k + 1) % n;
        }
        c_walls.push(g2);
        c_walls.push(wn);
        c_vertices.push(v2_new);

        let mut d_walls = vec![n2];
        let mut d_vertices = vec![v2_new];
        let mut k = (wall2 + 1) % n;
        loop {
            d_vertices.push(old_vertices[k]);
            if k == wall1 {
                break;
            }
            d_walls.push(old_walls[k]);
            k = (k + 1) % n;
        }
        d_walls.push(g1);
        d_walls.push(wn);
        d_vertices.push(v1_new);

        if c_vertices.len() < 3 || d_vertices.len() < 3 {
            return Err(TopologyError::DivisionRingNotFound {
                cell: cell_index,
                wall1,
                wall2,
            }
            .into());
        }

        // -- Flank rewrite: every daughter-ring wall except the separator
        // swaps its parent reference for the daughter.
        for &w in d_walls.iter().filter(|&&w| w != wn) {
            self.wall_mut(w)
                .replace_cell(CellRef::Cell(cell_index), CellRef::Cell(daughter));
        }

        // -- Vertex adjacency.
        {
            let v = self.vertex_mut(v1_new);
            v.walls = vec![g1, n1, wn];
            v.cells = vec![cell_index, daughter];
        }
        if let Some(nb) = self.wall(g1).other_cell(daughter).and_then(CellRef::cell) {
            if nb != cell_index {
                self.vertex_mut(v1_new).cells.push(nb);
            }
        }
        {
            let v = self.vertex_mut(v2_new);
            v.walls = vec![g2, n2, wn];
            v.cells = vec![cell_index, daughter];
        }
        if let Some(nb) = self.wall(g2).other_cell(cell_index).and_then(CellRef::cell) {
            if nb != daughter {
                self.vertex_mut(v2_new).cells.push(nb);
            }
        }
        self.vertex_mut(b).replace_wall(g1, n1);
        self.vertex_mut(d).replace_wall(g2, n2);
        for &v in d_vertices.iter().filter(|&&v| v != v1_new && v != v2_new) {
            self.vertex_mut(v).replace_cell(cell_index, daughter);
        }

        // -- Tell the neighbors across the cut walls about their new wall
        // halves and vertices.
        if let Some(nb) = self.wall(n1).other_cell(cell_index).and_then(CellRef::cell) {
            self.cell_mut(nb).walls.push(n1);
            self.cell_mut(nb).vertices.push(v1_new);
        }
        if let Some(nb) = self.wall(n2).other_cell(daughter).and_then(CellRef::cell) {
            self.cell_mut(nb).walls.push(n2);
            self.cell_mut(nb).vertices.push(v2_new);
        }

        // -- Install the rings.
        {
            let cell = self.cell_mut(cell_index);
            cell.walls = c_walls;
            cell.vertices = c_vertices;
            cell.invalidate_cache();
        }
        let parent_offset = self.cell(cell_index).center_offset;
        {
            let cell = self.cell_mut(daughter);
            cell.walls = d_walls;
            cell.vertices = d_vertices;
            cell.center_offset = parent_offset;
        }

        // -- Direction hook, volume partitioning, re-sort, verification.
        self.update_direction_division(state, cell_index, daughter, normal)?;

        let dim = self.dimension();
        let area_parent = self.cell(cell_index).area(state, dim);
        let area_daughter = self.cell(daughter).area(state, dim);
        let total = area_parent + area_daughter;
        if total > TOLERANCE {
            for &col in volume_coupled {
                state.cell_data[cell_index][col] *= area_parent / total;
                state.cell_data[daughter][col] *= area_daughter / total;
            }
        }

        self.sort_cell_wall_and_cell_vertex()?;
        if self.cell(cell_index).center_offset.is_some() {
            self.write_center_payload(cell_index, state);
            self.write_center_payload(daughter, state);
        }
        self.check_connectivity(false)?;

        tracing::debug!(
            parent = cell_index,
            daughter,
            separator = wn,
            "cell divided"
        );
        Ok(daughter)
    }
}

/// Fraction of the projection of `p` along the segment `from -> to`,
/// snapped into `[snap, 1 - snap]`. `None` when the result still coincides
/// with an endpoint (degenerate cut).
fn project_fraction(
    state: &TissueState,
    from: usize,
    to: usize,
    p: &[f64],
    snap: f64,
) -> Option<f64> {
    let a = position3(&state.vertex_data[from]);
    let b = position3(&state.vertex_data[to]);
    let seg = b - a;
    let len2 = seg.norm_squared();
    if len2 < TOLERANCE {
        return None;
    }
    let mut t = (position3(p) - a).dot(&seg) / len2;
    if snap > 0.0 && snap < 0.5 {
        t = t.clamp(snap, 1.0 - snap);
    }
    if t <= TOLERANCE || t >= 1.0 - TOLERANCE {
        return None;
    }
    Some(t)
}

/// Interpolates two position rows at fraction `t`.
fn lerp_rows(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + t * (y - x)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::topology::fixtures;

    #[test]
    fn triangle_division_conserves_area() {
        let (mut tissue, mut state) = fixtures::single_triangle();
        let before = tissue.cell(0).area(&state, 2);

        let daughter = tissue
            .divide_cell(
                &mut state,
                0,
                0,
                1,
                &[0.5, 0.0],
                &[0.5, 0.5],
                &[0.0, 0.0],
                &[],
                0.0,
            )
            .unwrap();

        assert_eq!(tissue.num_cells(), 2);
        assert_eq!(daughter, 1);
        let after = tissue.cell(0).area(&state, 2) + tissue.cell(1).area(&state, 2);
        assert!((after - before).abs() < 1e-12);
        tissue.check_connectivity(false).unwrap();
    }

    #[test]
    fn division_appends_expected_entities() {
        let (mut tissue, mut state) = fixtures::single_square();
        let (nc, nw, nv) = (tissue.num_cells(), tissue.num_walls(), tissue.num_vertices());

        tissue
            .divide_cell(
                &mut state,
                0,
                0,
                2,
                &[0.5, 0.0],
                &[0.5, 1.0],
                &[0.0, 1.0],
                &[],
                0.0,
            )
            .unwrap();

        assert_eq!(tissue.num_cells(), nc + 1);
        assert_eq!(tissue.num_walls(), nw + 3);
        assert_eq!(tissue.num_vertices(), nv + 2);
        assert_eq!(state.cell_data.len(), tissue.num_cells());
        assert_eq!(state.wall_data.len(), tissue.num_walls());
        assert_eq!(state.vertex_data.len(), tissue.num_vertices());
    }

    #[test]
    fn split_resting_lengths_are_proportional() {
        let (mut tissue, mut state) = fixtures::single_square();
        let g1 = tissue.cell(0).walls[0];
        let rest_before = state.wall_data[g1][0];

        tissue
            .divide_cell(
                &mut state,
                0,
                0,
                2,
                &[0.25, 0.0],
                &[0.25, 1.0],
                &[0.0, 1.0],
                &[],
                0.0,
            )
            .unwrap();

        // The two halves of the cut wall must restore the original resting
        // length, split at the cut fraction.
        let half1 = state.wall_data[g1][0];
        let half2 = state.wall_data[4][0];
        assert!((half1 + half2 - rest_before).abs() < 1e-12);
        assert!((half1 - 0.25 * rest_before).abs() < 1e-12);
    }

    #[test]
    fn volume_coupled_variables_partition_by_area() {
        let (mut tissue, mut state) = fixtures::single_square();
        state.cell_data[0][0] = 10.0;

        let daughter = tissue
            .divide_cell(
                &mut state,
                0,
                0,
                2,
                &[0.5, 0.0],
                &[0.5, 1.0],
                &[0.0, 1.0],
                &[0],
                0.0,
            )
            .unwrap();

        let total = state.cell_data[0][0] + state.cell_data[daughter][0];
        assert!((total - 10.0).abs() < 1e-12);
        // Symmetric cut: each daughter holds half.
        assert!((state.cell_data[0][0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn division_through_neighbor_wall_updates_neighbor() {
        let (mut tissue, mut state) = fixtures::two_squares();
        // Divide the left square through its shared wall with the right one.
        let shared_local = tissue
            .cell(0)
            .walls
            .iter()
            .position(|&w| tissue.wall(w).has_cell(1))
            .unwrap();
        let other_local = (shared_local + 2) % tissue.cell(0).num_walls();

        tissue
            .divide_cell(
                &mut state,
                0,
                shared_local,
                other_local,
                &[1.0, 0.5],
                &[0.0, 0.5],
                &[0.0, 1.0],
                &[],
                0.0,
            )
            .unwrap();

        // The right square gains one wall and one vertex from the split.
        assert_eq!(tissue.cell(1).num_walls(), 5);
        tissue.check_connectivity(false).unwrap();
    }

    #[test]
    fn cut_on_endpoint_is_rejected_without_mutation() {
        let (mut tissue, mut state) = fixtures::single_square();
        let walls_before = tissue.num_walls();

        let result = tissue.divide_cell(
            &mut state,
            0,
            0,
            2,
            &[1.0, 0.0], // exactly on a corner
            &[0.5, 1.0],
            &[0.0, 1.0],
            &[],
            0.0,
        );
        assert!(result.is_err());
        assert_eq!(tissue.num_walls(), walls_before);
        tissue.check_connectivity(false).unwrap();
    }

    #[test]
    fn snap_pulls_cut_off_endpoint() {
        let (mut tissue, mut state) = fixtures::single_square();
        // Point on a corner, but snapping moves it inside the wall.
        tissue
            .divide_cell(
                &mut state,
                0,
                0,
                2,
                &[1.0, 0.0],
                &[0.5, 1.0],
                &[0.0, 1.0],
                &[],
                0.05,
            )
            .unwrap();
        tissue.check_connectivity(false).unwrap();
    }

    #[test]
    fn same_wall_pair_is_rejected() {
        let (mut tissue, mut state) = fixtures::single_square();
        let result = tissue.divide_cell(
            &mut state,
            0,
            1,
            1,
            &[0.5, 0.0],
            &[0.5, 1.0],
            &[0.0, 1.0],
            &[],
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn center_payload_rebuilt_for_both_daughters() {
        let (mut tissue, mut state) = fixtures::single_square();
        tissue.init_center_triangulation(&mut state);
        let offset = tissue.cell(0).center_offset.unwrap();

        let daughter = tissue
            .divide_cell(
                &mut state,
                0,
                0,
                2,
                &[0.5, 0.0],
                &[0.5, 1.0],
                &[0.0, 1.0],
                &[],
                0.0,
            )
            .unwrap();

        for cell in [0, daughter] {
            let expected = offset + 2 + tissue.cell(cell).vertices.len();
            assert_eq!(state.cell_data[cell].len(), expected);
        }
    }
}
