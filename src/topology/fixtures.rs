//! Small literal meshes shared by tests across the crate.

use crate::state::TissueState;
use crate::topology::{CellRef, Tissue, WallTopology};

/// Builds a tissue from literal connectivity.
///
/// Wall records are `(vertex1, vertex2, cell1, cell2)` with `-1` denoting
/// background. Every wall's resting length is set to its current geometric
/// length; wall rows get one extra variable slot and cell rows get
/// `cell_vars` slots, all zero.
pub(crate) fn mesh(
    dimension: usize,
    positions: &[&[f64]],
    walls: &[(usize, usize, i64, i64)],
    num_cells: usize,
    cell_vars: usize,
) -> (Tissue, TissueState) {
    let vertex_data: Vec<Vec<f64>> = positions.iter().map(|p| p.to_vec()).collect();
    let wall_data: Vec<Vec<f64>> = walls
        .iter()
        .map(|&(v1, v2, _, _)| {
            let length = crate::math::row_distance(&vertex_data[v1], &vertex_data[v2]);
            vec![length, 0.0]
        })
        .collect();
    let state = TissueState {
        cell_data: vec![vec![0.0; cell_vars]; num_cells],
        wall_data,
        vertex_data,
    };
    let topology: Vec<WallTopology> = walls
        .iter()
        .map(|&(v1, v2, c1, c2)| WallTopology {
            vertex1: v1,
            vertex2: v2,
            cell1: CellRef::from_signed(c1),
            cell2: CellRef::from_signed(c2),
        })
        .collect();
    #[allow(clippy::unwrap_used)]
    let tissue = Tissue::read_from_data(dimension, &topology, &state).unwrap();
    (tissue, state)
}

/// One triangular cell: vertices (0,0), (1,0), (0,1).
pub(crate) fn single_triangle() -> (Tissue, TissueState) {
    mesh(
        2,
        &[&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]],
        &[(0, 1, 0, -1), (1, 2, 0, -1), (2, 0, 0, -1)],
        1,
        2,
    )
}

/// One unit-square cell.
pub(crate) fn single_square() -> (Tissue, TissueState) {
    mesh(
        2,
        &[&[0.0, 0.0], &[1.0, 0.0], &[1.0, 1.0], &[0.0, 1.0]],
        &[(0, 1, 0, -1), (1, 2, 0, -1), (2, 3, 0, -1), (3, 0, 0, -1)],
        1,
        2,
    )
}

/// Two unit squares sharing one wall (cells 0 and 1).
pub(crate) fn two_squares() -> (Tissue, TissueState) {
    mesh(
        2,
        &[
            &[0.0, 0.0],
            &[1.0, 0.0],
            &[2.0, 0.0],
            &[2.0, 1.0],
            &[1.0, 1.0],
            &[0.0, 1.0],
        ],
        &[
            (0, 1, 0, -1),
            (1, 2, 1, -1),
            (2, 3, 1, -1),
            (3, 4, 1, -1),
            (4, 5, 0, -1),
            (5, 0, 0, -1),
            (1, 4, 0, 1),
        ],
        2,
        2,
    )
}

/// One hexagonal cell with six walls, vertices on the unit circle.
pub(crate) fn hexagon() -> (Tissue, TissueState) {
    let positions: Vec<Vec<f64>> = (0..6)
        .map(|k| {
            let angle = std::f64::consts::FRAC_PI_3 * k as f64;
            vec![angle.cos(), angle.sin()]
        })
        .collect();
    let position_refs: Vec<&[f64]> = positions.iter().map(Vec::as_slice).collect();
    mesh(
        2,
        &position_refs,
        &[
            (0, 1, 0, -1),
            (1, 2, 0, -1),
            (2, 3, 0, -1),
            (3, 4, 0, -1),
            (4, 5, 0, -1),
            (5, 0, 0, -1),
        ],
        1,
        2,
    )
}

/// A 3x1 row of unit squares (cells 0, 1, 2 from left to right).
pub(crate) fn three_square_row() -> (Tissue, TissueState) {
    mesh(
        2,
        &[
            &[0.0, 0.0],
            &[1.0, 0.0],
            &[2.0, 0.0],
            &[3.0, 0.0],
            &[3.0, 1.0],
            &[2.0, 1.0],
            &[1.0, 1.0],
            &[0.0, 1.0],
        ],
        &[
            (0, 1, 0, -1),
            (1, 2, 1, -1),
            (2, 3, 2, -1),
            (3, 4, 2, -1),
            (4, 5, 2, -1),
            (5, 6, 1, -1),
            (6, 7, 0, -1),
            (7, 0, 0, -1),
            (1, 6, 0, 1),
            (2, 5, 1, 2),
        ],
        3,
        2,
    )
}
