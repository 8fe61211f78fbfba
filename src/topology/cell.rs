use crate::math::pca::PcaPlane;
use crate::math::{polygon, position3, Vector3};
use crate::state::TissueState;

use super::wall::Wall;

/// A cell: a polygon in 2D, a triangulated polyhedral facet in 3D.
///
/// Wall and vertex lists are kept in matching cyclic order after sorting:
/// wall `k` runs from vertex `k` to vertex `k + 1` (modulo the per-side
/// orientation flag). Cell variables live in `cell_data[index]`; when a
/// center triangulation is active its payload (centroid coordinates plus one
/// interior edge length per cell vertex) is appended at `center_offset`.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Stable position in the tissue's cell table.
    pub index: usize,
    /// Walls bounding this cell, cyclically ordered after sorting.
    pub walls: Vec<usize>,
    /// Vertices of this cell, cyclically ordered after sorting.
    pub vertices: Vec<usize>,
    /// Cached PCA plane for 3D cells; invalidated by topology edits.
    pub plane: Option<PcaPlane>,
    /// Column where the center-triangulation payload starts in
    /// `cell_data[index]`, when one has been initiated.
    pub center_offset: Option<usize>,
}

impl Cell {
    /// Creates a new cell with no connectivity.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            walls: Vec::new(),
            vertices: Vec::new(),
            plane: None,
            center_offset: None,
        }
    }

    /// Number of walls (equals the number of vertices on a valid cell).
    #[must_use]
    pub fn num_walls(&self) -> usize {
        self.walls.len()
    }

    /// Vertex positions in cyclic order.
    #[must_use]
    pub fn positions(&self, state: &TissueState) -> Vec<Vector3> {
        self.vertices
            .iter()
            .map(|&v| position3(&state.vertex_data[v]))
            .collect()
    }

    /// Cell area: absolute shoelace area in 2D, PCA-projected polygon area
    /// in 3D. This is the "volume" of the compartment-change vocabulary.
    #[must_use]
    pub fn area(&self, state: &TissueState, dimension: usize) -> f64 {
        let pts = self.positions(state);
        if dimension == 2 {
            polygon::signed_area_2d(&pts).abs()
        } else {
            match PcaPlane::fit(&pts) {
                Ok(plane) => polygon::polygon_area_3d(&pts, plane.normal()),
                Err(_) => 0.0,
            }
        }
    }

    /// Cell center: arithmetic mean of the vertex positions.
    #[must_use]
    pub fn center(&self, state: &TissueState) -> Vector3 {
        polygon::vertex_mean(&self.positions(state))
    }

    /// Unit normal of the cell plane: `+z` in 2D, the PCA normal in 3D.
    /// Uses the cached plane when one is present.
    #[must_use]
    pub fn normal(&self, state: &TissueState, dimension: usize) -> Vector3 {
        if dimension == 2 {
            return Vector3::new(0.0, 0.0, 1.0);
        }
        if let Some(plane) = &self.plane {
            return *plane.normal();
        }
        match PcaPlane::fit(&self.positions(state)) {
            Ok(plane) => *plane.normal(),
            Err(_) => Vector3::new(0.0, 0.0, 1.0),
        }
    }

    /// Local position of wall `wall` in this cell's wall list.
    #[must_use]
    pub fn wall_position(&self, wall: usize) -> Option<usize> {
        self.walls.iter().position(|&w| w == wall)
    }

    /// Local position of vertex `vertex` in this cell's vertex list.
    #[must_use]
    pub fn vertex_position(&self, vertex: usize) -> Option<usize> {
        self.vertices.iter().position(|&v| v == vertex)
    }

    /// True when any wall of this cell faces the background.
    #[must_use]
    pub fn is_epidermal(&self, walls: &[Wall]) -> bool {
        self.walls.iter().any(|&w| {
            walls[w].cell1.is_background() || walls[w].cell2.is_background()
        })
    }

    /// Local index of the geometrically longest wall.
    #[must_use]
    pub fn longest_wall(&self, walls: &[Wall], state: &TissueState) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (k, &w) in self.walls.iter().enumerate() {
            let wall = &walls[w];
            let a = position3(&state.vertex_data[wall.vertex1]);
            let b = position3(&state.vertex_data[wall.vertex2]);
            let len = (b - a).norm();
            if best.map_or(true, |(_, l)| len > l) {
                best = Some((k, len));
            }
        }
        best.map(|(k, _)| k)
    }

    /// Replaces every occurrence of wall `from` with `to`.
    pub fn replace_wall(&mut self, from: usize, to: usize) {
        for w in &mut self.walls {
            if *w == from {
                *w = to;
            }
        }
    }

    /// Replaces every occurrence of vertex `from` with `to`.
    pub fn replace_vertex(&mut self, from: usize, to: usize) {
        for v in &mut self.vertices {
            if *v == from {
                *v = to;
            }
        }
    }

    /// Drops cached geometry (the PCA plane). Called after topology edits.
    pub fn invalidate_cache(&mut self) {
        self.plane = None;
    }
}
