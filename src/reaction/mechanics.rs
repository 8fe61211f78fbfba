//! Mechanical reactions: wall springs, cell pressure, and triangular
//! biquadratic-spring elasticity.

use std::collections::HashMap;

use crate::error::Result;
use crate::math::{polygon, position3, Vector3, TOLERANCE};
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{
    add_vertex_force, check_cell_column, check_wall_column, expect_index_levels,
    expect_index_shape, expect_parameters, Constructor, Reaction, ReactionSpec,
};

pub(super) fn register(table: &mut HashMap<&'static str, Constructor>) {
    table.insert(WallSpring::ID, |spec| {
        Ok(Box::new(WallSpring::from_spec(spec)?))
    });
    table.insert(WallSpringAsymmetric::ID, |spec| {
        Ok(Box::new(WallSpringAsymmetric::from_spec(spec)?))
    });
    table.insert(WallSpringAnisotropic::ID, |spec| {
        Ok(Box::new(WallSpringAnisotropic::from_spec(spec)?))
    });
    table.insert(CellPressure::ID, |spec| {
        Ok(Box::new(CellPressure::from_spec(spec)?))
    });
    table.insert(Trbs::ID, |spec| Ok(Box::new(Trbs::from_spec(spec)?)));
    table.insert(TrbsCenterTriangulation::ID, |spec| {
        Ok(Box::new(TrbsCenterTriangulation::from_spec(spec)?))
    });
    table.insert(TrbsAnisotropic::ID, |spec| {
        Ok(Box::new(TrbsAnisotropic::from_spec(spec)?))
    });
}

/// Hookean spring on every wall, strain-normalized:
/// `F = k (L - L0) / L0` pulling the endpoints together when stretched.
///
/// Parameters: `[k]`. Indices: one level, either empty or one wall column
/// into which the current spring force is written after each accepted step.
pub struct WallSpring {
    spring_constant: f64,
    force_column: Option<usize>,
}

impl WallSpring {
    pub const ID: &'static str = "wall::spring";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_levels(Self::ID, spec, 1)?;
        if spec.indices[0].len() > 1 {
            expect_index_shape(Self::ID, spec, &[1])?;
        }
        Ok(Self {
            spring_constant: spec.parameters[0],
            force_column: spec.indices[0].first().copied(),
        })
    }
}

impl Reaction for WallSpring {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let a = position3(&state.vertex_data[wall.vertex1]);
            let b = position3(&state.vertex_data[wall.vertex2]);
            let diff = b - a;
            let length = diff.norm();
            let rest = state.wall_data[wall.index][0];
            if length < TOLERANCE || rest < TOLERANCE {
                continue;
            }
            let coefficient = self.spring_constant * (length - rest) / (rest * length);
            let force = diff * coefficient;
            add_vertex_force(derivs, wall.vertex1, &force);
            add_vertex_force(derivs, wall.vertex2, &(-force));
        }
    }

    fn update(&mut self, tissue: &mut Tissue, state: &mut TissueState, _step: f64) -> Result<()> {
        if let Some(column) = self.force_column {
            for i in 0..tissue.num_walls() {
                let wall = tissue.wall(i);
                let length = crate::math::row_distance(
                    &state.vertex_data[wall.vertex1],
                    &state.vertex_data[wall.vertex2],
                );
                let rest = state.wall_data[i][0];
                state.wall_data[i][column] = if rest < TOLERANCE {
                    0.0
                } else {
                    self.spring_constant * (length - rest) / rest
                };
            }
        }

        // Per-vertex stress direction: the principal axis of the incident
        // walls' tension tensor.
        for i in 0..tissue.num_vertices() {
            let walls = tissue.vertex(i).walls.clone();
            let mut tensor = crate::math::Matrix3::zeros();
            for w in walls {
                let wall = tissue.wall(w);
                let a = position3(&state.vertex_data[wall.vertex1]);
                let b = position3(&state.vertex_data[wall.vertex2]);
                let diff = b - a;
                let length = diff.norm();
                let rest = state.wall_data[w][0];
                if length < TOLERANCE || rest < TOLERANCE {
                    continue;
                }
                let tension = (self.spring_constant * (length - rest) / rest).abs();
                let t = diff / length;
                tensor += t * t.transpose() * tension;
            }
            let axis = if tissue.dimension() == 2 {
                crate::math::pca::principal_axis_2d(
                    tensor[(0, 0)],
                    tensor[(0, 1)],
                    tensor[(1, 1)],
                )
            } else {
                let eigen = nalgebra::SymmetricEigen::new(tensor);
                let mut best = 0;
                for k in 1..3 {
                    if eigen.eigenvalues[k] > eigen.eigenvalues[best] {
                        best = k;
                    }
                }
                eigen.eigenvectors.column(best).into_owned()
            };
            tissue.vertex_mut(i).stress_direction = Some(axis);
        }
        Ok(())
    }

    fn print_state(
        &self,
        tissue: &Tissue,
        state: &TissueState,
        out: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        for wall in tissue.walls() {
            let length = crate::math::row_distance(
                &state.vertex_data[wall.vertex1],
                &state.vertex_data[wall.vertex2],
            );
            writeln!(out, "{} {} {}", wall.index, length, state.wall_data[wall.index][0])?;
        }
        Ok(())
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        if let Some(column) = self.force_column {
            check_wall_column(Self::ID, column, state)?;
        }
        Ok(())
    }
}

/// Wall spring whose stiffness is read per side from two wall variables:
/// `F = k (s1 + s2) (L - L0) / L0`.
///
/// Parameters: `[k]`. Indices: `[[side1_column, side2_column]]`.
pub struct WallSpringAsymmetric {
    spring_constant: f64,
    side_columns: [usize; 2],
}

impl WallSpringAsymmetric {
    pub const ID: &'static str = "wall::spring_asymmetric";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[2])?;
        Ok(Self {
            spring_constant: spec.parameters[0],
            side_columns: [spec.indices[0][0], spec.indices[0][1]],
        })
    }
}

impl Reaction for WallSpringAsymmetric {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let a = position3(&state.vertex_data[wall.vertex1]);
            let b = position3(&state.vertex_data[wall.vertex2]);
            let diff = b - a;
            let length = diff.norm();
            let row = &state.wall_data[wall.index];
            let rest = row[0];
            if length < TOLERANCE || rest < TOLERANCE {
                continue;
            }
            let stiffness = row[self.side_columns[0]] + row[self.side_columns[1]];
            let coefficient =
                self.spring_constant * stiffness * (length - rest) / (rest * length);
            let force = diff * coefficient;
            add_vertex_force(derivs, wall.vertex1, &force);
            add_vertex_force(derivs, wall.vertex2, &(-force));
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        for column in self.side_columns {
            check_wall_column(Self::ID, column, state)?;
        }
        Ok(())
    }
}

/// Wall spring weakened along the flanking cells' direction field, the
/// microtubule-style anisotropy modifier:
/// `k_eff = k_iso + k_aniso (1 - |cos(wall, direction)|)` averaged over the
/// flanking cells carrying a defined direction.
///
/// Parameters: `[k_iso, k_aniso]`. Indices: `[[direction_start_column]]`.
pub struct WallSpringAnisotropic {
    isotropic: f64,
    anisotropic: f64,
    direction_column: usize,
}

impl WallSpringAnisotropic {
    pub const ID: &'static str = "wall::spring_anisotropic";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_shape(Self::ID, spec, &[1])?;
        Ok(Self {
            isotropic: spec.parameters[0],
            anisotropic: spec.parameters[1],
            direction_column: spec.indices[0][0],
        })
    }

    fn effective_constant(
        &self,
        tissue: &Tissue,
        state: &TissueState,
        wall: usize,
        axis: &Vector3,
    ) -> f64 {
        let dim = tissue.dimension();
        let mut sum = 0.0;
        let mut count = 0;
        let w = tissue.wall(wall);
        for flank in [w.cell1, w.cell2] {
            let Some(c) = flank.cell() else { continue };
            let row = &state.cell_data[c];
            let flag = row[self.direction_column + dim];
            if flag < 0.5 {
                continue;
            }
            let direction = position3(&row[self.direction_column..self.direction_column + dim]);
            let norm = direction.norm();
            if norm < TOLERANCE {
                continue;
            }
            let alignment = (axis.dot(&direction) / norm).abs();
            sum += self.isotropic + self.anisotropic * (1.0 - alignment);
            count += 1;
        }
        if count == 0 {
            self.isotropic + self.anisotropic
        } else {
            sum / f64::from(count)
        }
    }
}

impl Reaction for WallSpringAnisotropic {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let a = position3(&state.vertex_data[wall.vertex1]);
            let b = position3(&state.vertex_data[wall.vertex2]);
            let diff = b - a;
            let length = diff.norm();
            let rest = state.wall_data[wall.index][0];
            if length < TOLERANCE || rest < TOLERANCE {
                continue;
            }
            let axis = diff / length;
            let k = self.effective_constant(tissue, state, wall.index, &axis);
            let coefficient = k * (length - rest) / (rest * length);
            let force = diff * coefficient;
            add_vertex_force(derivs, wall.vertex1, &force);
            add_vertex_force(derivs, wall.vertex2, &(-force));
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        // Highest column read is the defined-flag slot behind the vector.
        let dim = state.vertex_data.first().map_or(0, Vec::len);
        check_cell_column(Self::ID, self.direction_column + dim, state)
    }
}

/// Internal pressure pushing every cell boundary outward, two-dimensional:
/// each wall's endpoints receive `P * L / 2` along the wall's outward
/// normal.
///
/// Parameters: `[pressure]`. Indices: none.
pub struct CellPressure {
    pressure: f64,
}

impl CellPressure {
    pub const ID: &'static str = "cell::pressure";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            pressure: spec.parameters[0],
        })
    }
}

impl Reaction for CellPressure {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        if tissue.dimension() != 2 {
            return;
        }
        for cell in tissue.cells() {
            let points = cell.positions(state);
            let orientation = polygon::signed_area_2d(&points).signum();
            let n = cell.vertices.len();
            for k in 0..n {
                let a = cell.vertices[k];
                let b = cell.vertices[(k + 1) % n];
                let edge = points[(k + 1) % n] - points[k];
                // Outward normal of a CCW edge is its clockwise rotation.
                let outward = Vector3::new(edge.y, -edge.x, 0.0) * orientation;
                let force = outward * (0.5 * self.pressure);
                add_vertex_force(derivs, a, &force);
                add_vertex_force(derivs, b, &force);
            }
        }
    }
}

// --- Triangular biquadratic springs ---

/// Per-edge derivatives of the biquadratic-spring energy of one triangle.
///
/// `rest` holds the resting edge lengths with edge `i` opposite corner `i`;
/// `corners` are the current positions. `young` may differ per edge (the
/// anisotropic variants feed fiber-weighted moduli). Returns the force on
/// each corner, or `None` for a degenerate resting shape.
fn trbs_triangle_forces(
    rest: [f64; 3],
    corners: [Vector3; 3],
    young: [f64; 3],
    poisson: f64,
) -> Option<[Vector3; 3]> {
    let rest_area = polygon::heron_area(rest[0], rest[1], rest[2]);
    if rest_area < TOLERANCE {
        return None;
    }

    let cot = [
        polygon::cotangent_opposite(rest[0], rest[1], rest[2]),
        polygon::cotangent_opposite(rest[1], rest[2], rest[0]),
        polygon::cotangent_opposite(rest[2], rest[0], rest[1]),
    ];

    let lame = |e: f64| {
        let lambda = e * poisson / (1.0 - poisson * poisson);
        let mu = e / (2.0 * (1.0 + poisson));
        (lambda, mu)
    };

    // Tensile stiffness of edge i and cross stiffness of each edge pair.
    let mut k = [0.0; 3];
    for i in 0..3 {
        let (lambda, mu) = lame(young[i]);
        k[i] = (2.0 * cot[i] * cot[i] * (lambda + mu) + mu) / (16.0 * rest_area);
    }
    let mut c = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in (i + 1)..3 {
            let (lambda, mu) = lame(0.5 * (young[i] + young[j]));
            let value = (2.0 * cot[i] * cot[j] * (lambda + mu) + lambda - mu)
                / (16.0 * rest_area);
            c[i][j] = value;
            c[j][i] = value;
        }
    }

    // Edge i connects the two corners other than i.
    let edge_corners = [(1usize, 2usize), (2, 0), (0, 1)];
    let mut strain = [0.0; 3]; // l^2 - L^2 per edge
    for i in 0..3 {
        let (a, b) = edge_corners[i];
        strain[i] = (corners[b] - corners[a]).norm_squared() - rest[i] * rest[i];
    }

    let mut gradient = [0.0; 3]; // dW/d(l_i^2)
    for i in 0..3 {
        gradient[i] = 0.5 * k[i] * strain[i];
        for j in 0..3 {
            if j != i {
                gradient[i] += 0.5 * c[i][j] * strain[j];
            }
        }
    }

    let mut forces = [Vector3::zeros(); 3];
    for i in 0..3 {
        let (a, b) = edge_corners[i];
        let pull = (corners[a] - corners[b]) * (2.0 * gradient[i]);
        forces[a] -= pull;
        forces[b] += pull;
    }
    Some(forces)
}

/// St Venant-Kirchhoff elasticity for triangular cells via biquadratic
/// springs. Every cell must be a triangle; resting edge lengths are the
/// walls' resting lengths.
///
/// Parameters: `[young, poisson]`. Indices: none.
pub struct Trbs {
    young: f64,
    poisson: f64,
}

impl Trbs {
    pub const ID: &'static str = "cell::trbs";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            young: spec.parameters[0],
            poisson: spec.parameters[1],
        })
    }
}

impl Reaction for Trbs {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn initiate(
        &mut self,
        tissue: &mut Tissue,
        _state: &mut TissueState,
        _derivs: &mut TissueState,
    ) -> Result<()> {
        if let Some(cell) = tissue.cells().iter().find(|c| c.vertices.len() != 3) {
            return Err(crate::error::ConfigError::Invalid(format!(
                "{} requires triangular cells; cell {} has {} vertices",
                Self::ID,
                cell.index,
                cell.vertices.len()
            ))
            .into());
        }
        Ok(())
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for cell in tissue.cells() {
            if cell.vertices.len() != 3 {
                continue;
            }
            let corners = [
                position3(&state.vertex_data[cell.vertices[0]]),
                position3(&state.vertex_data[cell.vertices[1]]),
                position3(&state.vertex_data[cell.vertices[2]]),
            ];
            // Wall k runs from vertex k to vertex k+1, so the edge opposite
            // corner 0 is wall 1, and so on.
            let rest = [
                state.wall_data[cell.walls[1]][0],
                state.wall_data[cell.walls[2]][0],
                state.wall_data[cell.walls[0]][0],
            ];
            let Some(forces) =
                trbs_triangle_forces(rest, corners, [self.young; 3], self.poisson)
            else {
                continue;
            };
            for (corner, force) in cell.vertices.iter().zip(forces.iter()) {
                add_vertex_force(derivs, *corner, force);
            }
        }
    }
}

/// Biquadratic-spring elasticity over the center triangulation: each cell
/// is a fan of triangles sharing the centroid carried in the cell's
/// variable row. Forces on the centroid integrate through the cell
/// derivative matrix, so the centroid moves with the tissue.
///
/// Parameters: `[young, poisson]`. Indices: none.
pub struct TrbsCenterTriangulation {
    young: f64,
    poisson: f64,
}

impl TrbsCenterTriangulation {
    pub const ID: &'static str = "cell::trbs_center";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_levels(Self::ID, spec, 0)?;
        Ok(Self {
            young: spec.parameters[0],
            poisson: spec.parameters[1],
        })
    }
}

/// Applies fan-triangle TRBS forces for every center-triangulated cell.
fn center_fan_derivs(
    tissue: &Tissue,
    state: &TissueState,
    derivs: &mut TissueState,
    young_for: &dyn Fn(&TissueState, usize, &Vector3) -> f64,
    poisson: f64,
) {
    let dim = tissue.dimension();
    for cell in tissue.cells() {
        let Some(offset) = cell.center_offset else {
            continue;
        };
        let row = &state.cell_data[cell.index];
        let centroid = position3(&row[offset..offset + dim]);
        let n = cell.vertices.len();
        for k in 0..n {
            let next = (k + 1) % n;
            let va = cell.vertices[k];
            let vb = cell.vertices[next];
            let pa = position3(&state.vertex_data[va]);
            let pb = position3(&state.vertex_data[vb]);

            let boundary_rest = state.wall_data[cell.walls[k]][0];
            let inner_rest_a = row[offset + dim + k];
            let inner_rest_b = row[offset + dim + next];
            let rest = [boundary_rest, inner_rest_b, inner_rest_a];
            let corners = [centroid, pa, pb];

            let young = [
                young_for(state, cell.index, &(pb - pa)),
                young_for(state, cell.index, &(centroid - pb)),
                young_for(state, cell.index, &(centroid - pa)),
            ];
            let Some(forces) = trbs_triangle_forces(rest, corners, young, poisson) else {
                continue;
            };
            for d in 0..dim {
                derivs.cell_data[cell.index][offset + d] += forces[0][d];
            }
            add_vertex_force(derivs, va, &forces[1]);
            add_vertex_force(derivs, vb, &forces[2]);
        }
    }
}

impl Reaction for TrbsCenterTriangulation {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn initiate(
        &mut self,
        tissue: &mut Tissue,
        state: &mut TissueState,
        _derivs: &mut TissueState,
    ) -> Result<()> {
        tissue.init_center_triangulation(state);
        Ok(())
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        let young = self.young;
        center_fan_derivs(tissue, state, derivs, &move |_, _, _| young, self.poisson);
    }
}

/// Center-triangulation TRBS with a fiber direction: edges aligned with the
/// cell's direction field feel `young_long`, transverse edges feel
/// `young_trans`, interpolated by the squared cosine of the angle between
/// edge and fiber. Cells without a defined direction use the mean modulus.
///
/// Parameters: `[young_long, young_trans, poisson]`.
/// Indices: `[[direction_start_column]]`.
pub struct TrbsAnisotropic {
    young_long: f64,
    young_trans: f64,
    poisson: f64,
    direction_column: usize,
}

impl TrbsAnisotropic {
    pub const ID: &'static str = "cell::trbs_anisotropic";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 3)?;
        expect_index_shape(Self::ID, spec, &[1])?;
        Ok(Self {
            young_long: spec.parameters[0],
            young_trans: spec.parameters[1],
            poisson: spec.parameters[2],
            direction_column: spec.indices[0][0],
        })
    }
}

impl Reaction for TrbsAnisotropic {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn initiate(
        &mut self,
        tissue: &mut Tissue,
        state: &mut TissueState,
        _derivs: &mut TissueState,
    ) -> Result<()> {
        tissue.init_center_triangulation(state);
        Ok(())
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        let dim = tissue.dimension();
        let column = self.direction_column;
        let (young_long, young_trans) = (self.young_long, self.young_trans);
        let young_for = move |state: &TissueState, cell: usize, edge: &Vector3| {
            let row = &state.cell_data[cell];
            let flag = row[column + dim];
            let edge_norm = edge.norm();
            if flag < 0.5 || edge_norm < TOLERANCE {
                return 0.5 * (young_long + young_trans);
            }
            let fiber = position3(&row[column..column + dim]);
            let fiber_norm = fiber.norm();
            if fiber_norm < TOLERANCE {
                return 0.5 * (young_long + young_trans);
            }
            let cos = edge.dot(&fiber) / (edge_norm * fiber_norm);
            young_trans + (young_long - young_trans) * cos * cos
        };
        center_fan_derivs(tissue, state, derivs, &young_for, self.poisson);
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        let dim = state.vertex_data.first().map_or(0, Vec::len);
        check_cell_column(Self::ID, self.direction_column + dim, state)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::fixtures;

    fn spring(k: f64) -> WallSpring {
        WallSpring::from_spec(&ReactionSpec::new("wall::spring", vec![k], vec![vec![]])).unwrap()
    }

    // ── wall::spring ──

    #[test]
    fn spring_at_rest_is_silent() {
        let (tissue, state) = fixtures::single_triangle();
        let mut derivs = state.zeroed_like();
        spring(1.0).derivs(&tissue, &state, &mut derivs);
        for row in &derivs.vertex_data {
            for &x in row {
                assert!(x.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn stretched_spring_pulls_endpoints_together() {
        let (tissue, mut state) = fixtures::single_square();
        // Halve the resting length of the bottom wall.
        let w = tissue.cell(0).walls[0];
        state.wall_data[w][0] = 0.5;
        let mut derivs = state.zeroed_like();
        spring(1.0).derivs(&tissue, &state, &mut derivs);

        let wall = tissue.wall(w);
        let (v1, v2) = (wall.vertex1, wall.vertex2);
        let along = state.vertex_data[v2][0] - state.vertex_data[v1][0];
        // v1 is pulled toward v2 and vice versa.
        assert!(derivs.vertex_data[v1][0] * along > 0.0);
        assert!(derivs.vertex_data[v2][0] * along < 0.0);
    }

    #[test]
    fn spring_forces_balance() {
        let (tissue, mut state) = fixtures::hexagon();
        for row in &mut state.wall_data {
            row[0] *= 0.7;
        }
        let mut derivs = state.zeroed_like();
        spring(2.5).derivs(&tissue, &state, &mut derivs);
        for d in 0..2 {
            let net: f64 = derivs.vertex_data.iter().map(|r| r[d]).sum();
            assert!(net.abs() < 1e-12);
        }
    }

    #[test]
    fn spring_update_computes_stress_direction() {
        let (mut tissue, mut state) = fixtures::single_square();
        // Tension only on the two horizontal walls.
        for wall in 0..tissue.num_walls() {
            let w = tissue.wall(wall);
            let horizontal =
                (state.vertex_data[w.vertex1][1] - state.vertex_data[w.vertex2][1]).abs() < 1e-9;
            if horizontal {
                state.wall_data[wall][0] = 0.5;
            }
        }
        let mut r = spring(1.0);
        r.update(&mut tissue, &mut state, 0.01).unwrap();

        for vertex in tissue.vertices() {
            let axis = vertex.stress_direction.unwrap();
            assert!(axis.x.abs() > 0.99, "stress axis should be horizontal");
        }
    }

    #[test]
    fn spring_print_state_lists_walls() {
        let (tissue, state) = fixtures::single_triangle();
        let mut buffer = Vec::new();
        spring(1.0)
            .print_state(&tissue, &state, &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn spring_update_stores_force() {
        let (mut tissue, mut state) = fixtures::single_square();
        let mut r = WallSpring::from_spec(&ReactionSpec::new(
            "wall::spring",
            vec![2.0],
            vec![vec![1]],
        ))
        .unwrap();
        let w = tissue.cell(0).walls[0];
        state.wall_data[w][0] = 0.5;
        r.update(&mut tissue, &mut state, 0.01).unwrap();
        assert!((state.wall_data[w][1] - 2.0).abs() < 1e-12);
    }

    // ── wall::spring_asymmetric ──

    #[test]
    fn asymmetric_spring_uses_side_stiffness() {
        let (tissue, mut state) = fixtures::single_square();
        for row in &mut state.wall_data {
            row.push(0.0); // third column: second side stiffness
        }
        let w = tissue.cell(0).walls[0];
        state.wall_data[w][0] = 0.5;
        state.wall_data[w][1] = 1.0;
        state.wall_data[w][2] = 1.0;

        let r = WallSpringAsymmetric::from_spec(&ReactionSpec::new(
            "wall::spring_asymmetric",
            vec![1.0],
            vec![vec![1, 2]],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);

        // Stiffness 1 + 1 doubles the plain spring's pull on this wall.
        let mut plain = state.zeroed_like();
        spring(2.0).derivs(&tissue, &state, &mut plain);
        let wall = tissue.wall(w);
        assert!(
            (derivs.vertex_data[wall.vertex1][0] - plain.vertex_data[wall.vertex1][0]).abs()
                < 1e-9
        );
    }

    // ── wall::spring_anisotropic ──

    #[test]
    fn anisotropic_spring_weakens_aligned_walls() {
        let (tissue, mut state) = fixtures::single_square();
        for row in &mut state.cell_data {
            row.resize(5, 0.0);
        }
        // Direction along x with the defined-flag raised: walls parallel
        // to x keep the isotropic constant, walls across it get both.
        state.cell_data[0][2] = 1.0;
        state.cell_data[0][4] = 1.0;
        for row in &mut state.wall_data {
            row[0] = 0.5;
        }

        let r = WallSpringAnisotropic::from_spec(&ReactionSpec::new(
            "wall::spring_anisotropic",
            vec![1.0, 1.0],
            vec![vec![2]],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);

        // Corner (0,0): the bottom wall pulls +x with k = 1, the left
        // wall pulls +y with k = 2.
        let corner = &derivs.vertex_data[0];
        assert!(corner[0] > 0.0 && corner[1] > 0.0);
        assert!((corner[1] / corner[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn anisotropic_trbs_is_silent_at_rest() {
        let (mut tissue, mut state) = fixtures::hexagon();
        for row in &mut state.cell_data {
            row.resize(5, 0.0);
        }
        state.cell_data[0][2] = 1.0;
        state.cell_data[0][4] = 1.0;
        let mut r = TrbsAnisotropic::from_spec(&ReactionSpec::new(
            "cell::trbs_anisotropic",
            vec![8.0, 2.0, 0.3],
            vec![vec![2]],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.initiate(&mut tissue, &mut state, &mut derivs).unwrap();

        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        for row in &derivs.vertex_data {
            for &x in row {
                assert!(x.abs() < 1e-9);
            }
        }
    }

    // ── cell::pressure ──

    #[test]
    fn pressure_pushes_square_outward() {
        let (tissue, state) = fixtures::single_square();
        let r = CellPressure::from_spec(&ReactionSpec::new(
            "cell::pressure",
            vec![1.0],
            vec![],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);

        let center = tissue.cell(0).center(&state);
        for vertex in tissue.vertices() {
            let outward = position3(&vertex.position) - center;
            let force = position3(&derivs.vertex_data[vertex.index]);
            assert!(force.dot(&outward) > 0.0);
        }
    }

    #[test]
    fn pressure_forces_balance() {
        let (tissue, state) = fixtures::hexagon();
        let r = CellPressure::from_spec(&ReactionSpec::new(
            "cell::pressure",
            vec![3.0],
            vec![],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        for d in 0..2 {
            let net: f64 = derivs.vertex_data.iter().map(|r| r[d]).sum();
            assert!(net.abs() < 1e-12);
        }
    }

    // ── cell::trbs ──

    #[test]
    fn trbs_at_rest_is_silent() {
        let (tissue, state) = fixtures::single_triangle();
        let r =
            Trbs::from_spec(&ReactionSpec::new("cell::trbs", vec![10.0, 0.3], vec![]))
                .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        for row in &derivs.vertex_data {
            for &x in row {
                assert!(x.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn trbs_resists_uniform_stretch() {
        let (tissue, mut state) = fixtures::single_triangle();
        for row in &mut state.vertex_data {
            for x in row.iter_mut() {
                *x *= 1.2;
            }
        }
        let r =
            Trbs::from_spec(&ReactionSpec::new("cell::trbs", vec![10.0, 0.3], vec![]))
                .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);

        // Every vertex is pulled back toward the centroid.
        let center = tissue.cell(0).center(&state);
        for vertex in tissue.vertices() {
            let inward = center - position3(&state.vertex_data[vertex.index]);
            let force = position3(&derivs.vertex_data[vertex.index]);
            assert!(force.dot(&inward) > 0.0);
        }
        // And momentum is conserved.
        for d in 0..2 {
            let net: f64 = derivs.vertex_data.iter().map(|r| r[d]).sum();
            assert!(net.abs() < 1e-9);
        }
    }

    #[test]
    fn trbs_rejects_non_triangular_cells() {
        let (mut tissue, mut state) = fixtures::single_square();
        let mut r =
            Trbs::from_spec(&ReactionSpec::new("cell::trbs", vec![10.0, 0.3], vec![]))
                .unwrap();
        let mut derivs = state.zeroed_like();
        assert!(r.initiate(&mut tissue, &mut state, &mut derivs).is_err());
    }

    // ── cell::trbs_center ──

    #[test]
    fn center_trbs_initiates_payload_and_rests_silent() {
        let (mut tissue, mut state) = fixtures::hexagon();
        let mut r = TrbsCenterTriangulation::from_spec(&ReactionSpec::new(
            "cell::trbs_center",
            vec![5.0, 0.25],
            vec![],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.initiate(&mut tissue, &mut state, &mut derivs).unwrap();
        assert!(tissue.cell(0).center_offset.is_some());

        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        for row in derivs.vertex_data.iter().chain(derivs.cell_data.iter()) {
            for &x in row {
                assert!(x.abs() < 1e-9, "nonzero force at rest: {x}");
            }
        }
    }

    #[test]
    fn center_trbs_restores_stretched_fan() {
        let (mut tissue, mut state) = fixtures::hexagon();
        let mut r = TrbsCenterTriangulation::from_spec(&ReactionSpec::new(
            "cell::trbs_center",
            vec![5.0, 0.25],
            vec![],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.initiate(&mut tissue, &mut state, &mut derivs).unwrap();

        for row in &mut state.vertex_data {
            for x in row.iter_mut() {
                *x *= 1.3;
            }
        }
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        for vertex in tissue.vertices() {
            let inward = -position3(&state.vertex_data[vertex.index]);
            let force = position3(&derivs.vertex_data[vertex.index]);
            assert!(force.dot(&inward) > 0.0);
        }
    }
}
