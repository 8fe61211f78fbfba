//! Division rules: pick a separating line through the dividing cell and
//! delegate the surgery to `Tissue::divide_cell`.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ConfigError, Result, TopologyError};
use crate::math::pca::PcaPlane;
use crate::math::{position3, Vector3, TOLERANCE};
use crate::reaction::ReactionSpec;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{CompartmentChange, CompartmentOutcome, Constructor};

pub(super) fn register(table: &mut HashMap<&'static str, Constructor>) {
    table.insert(DivisionVolumeViaLongestWall::ID, |spec| {
        Ok(Box::new(DivisionVolumeViaLongestWall::from_spec(spec)?))
    });
    table.insert(DivisionVolumeViaDirection::ID, |spec| {
        Ok(Box::new(DivisionVolumeViaDirection::from_spec(spec)?))
    });
    table.insert(DivisionVolumeRandomDirection::ID, |spec| {
        Ok(Box::new(DivisionVolumeRandomDirection::from_spec(spec)?))
    });
}

/// In-plane frame of a cell: origin plus two orthonormal axes. The XY
/// frame in 2D, the PCA frame in 3D.
struct CellFrame {
    origin: Vector3,
    u: Vector3,
    v: Vector3,
}

impl CellFrame {
    fn build(tissue: &Tissue, state: &TissueState, cell: usize) -> Result<Self> {
        if tissue.dimension() == 2 {
            Ok(Self {
                origin: Vector3::zeros(),
                u: Vector3::new(1.0, 0.0, 0.0),
                v: Vector3::new(0.0, 1.0, 0.0),
            })
        } else {
            let plane = PcaPlane::fit(&tissue.cell(cell).positions(state))?;
            Ok(Self {
                origin: *plane.centroid(),
                u: *plane.axis1(),
                v: *plane.axis2(),
            })
        }
    }

    fn project(&self, p: &Vector3) -> (f64, f64) {
        let d = p - self.origin;
        (d.dot(&self.u), d.dot(&self.v))
    }

    fn project_vector(&self, d: &Vector3) -> (f64, f64) {
        (d.dot(&self.u), d.dot(&self.v))
    }
}

/// The two wall crossings of an infinite cut line through a cell.
struct CutPair {
    wall1: usize,
    point1: Vec<f64>,
    wall2: usize,
    point2: Vec<f64>,
    normal: Vec<f64>,
}

/// Intersects the line `origin + s * direction` with the cell boundary and
/// returns the two crossing walls (local positions) with the crossing
/// points. When the line clips more than two walls (concave cells), the
/// most distant pair is taken.
fn find_cut_pair(
    tissue: &Tissue,
    state: &TissueState,
    cell: usize,
    origin: &Vector3,
    direction: &Vector3,
) -> Result<CutPair> {
    let frame = CellFrame::build(tissue, state, cell)?;
    let (ox, oy) = frame.project(origin);
    let (dx, dy) = frame.project_vector(direction);
    if (dx * dx + dy * dy).sqrt() < TOLERANCE {
        return Err(TopologyError::Invalid(format!(
            "cut line direction degenerates in the plane of cell {cell}"
        ))
        .into());
    }

    let c = tissue.cell(cell);
    let n = c.vertices.len();
    let dim = tissue.dimension();
    let mut hits: Vec<(usize, Vec<f64>, f64, f64)> = Vec::new();
    for k in 0..n {
        let pa = position3(&state.vertex_data[c.vertices[k]]);
        let pb = position3(&state.vertex_data[c.vertices[(k + 1) % n]]);
        let (ax, ay) = frame.project(&pa);
        let (bx, by) = frame.project(&pb);
        let (ex, ey) = (bx - ax, by - ay);

        let cross = dx * ey - dy * ex;
        if cross.abs() < TOLERANCE {
            continue;
        }
        let (wx, wy) = (ax - ox, ay - oy);
        let s = (wx * ey - wy * ex) / cross;
        let t = (wx * dy - wy * dx) / cross;
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let point3d = pa + (pb - pa) * t;
        let row: Vec<f64> = (0..dim).map(|d| point3d[d]).collect();
        hits.push((k, row, s, t));
    }

    // Drop duplicate crossings through a shared vertex.
    hits.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    hits.dedup_by(|a, b| (a.2 - b.2).abs() < TOLERANCE);

    if hits.len() < 2 {
        return Err(TopologyError::Invalid(format!(
            "cut line crosses {} walls of cell {cell}, need 2",
            hits.len()
        ))
        .into());
    }
    // Most distant pair along the line: first and last after sorting by s.
    let (w1, p1) = (hits[0].0, hits[0].1.clone());
    let (w2, p2) = {
        let tail = &hits[hits.len() - 1];
        (tail.0, tail.1.clone())
    };

    // Normal of the new wall: the cut direction's in-plane perpendicular.
    let normal3 = frame.u * (-dy) + frame.v * dx;
    let normal: Vec<f64> = (0..dim).map(|d| normal3[d]).collect();

    Ok(CutPair {
        wall1: w1,
        point1: p1,
        wall2: w2,
        point2: p2,
        normal,
    })
}

fn divide_with_cut(
    tissue: &mut Tissue,
    state: &mut TissueState,
    cell: usize,
    cut: &CutPair,
    volume_coupled: &[usize],
    snap: f64,
) -> Result<CompartmentOutcome> {
    tissue.divide_cell(
        state,
        cell,
        cut.wall1,
        cut.wall2,
        &cut.point1,
        &cut.point2,
        &cut.normal,
        volume_coupled,
        snap,
    )?;
    Ok(CompartmentOutcome::CellAdded)
}

/// Divides any cell above a volume threshold through the midpoint of its
/// longest wall, perpendicular to that wall.
///
/// Parameters: `[volume_threshold, snap_fraction]`.
/// Indices: `[[volume-coupled cell columns...]]`.
pub struct DivisionVolumeViaLongestWall {
    threshold: f64,
    snap: f64,
    volume_coupled: Vec<usize>,
}

impl DivisionVolumeViaLongestWall {
    pub const ID: &'static str = "division::longest_wall";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        crate::reaction::expect_parameters(Self::ID, spec, 2)?;
        crate::reaction::expect_index_levels(Self::ID, spec, 1)?;
        Ok(Self {
            threshold: spec.parameters[0],
            snap: spec.parameters[1],
            volume_coupled: spec.indices[0].clone(),
        })
    }
}

impl CompartmentChange for DivisionVolumeViaLongestWall {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn flag(&self, tissue: &Tissue, cell: usize, state: &TissueState) -> bool {
        tissue.cell(cell).area(state, tissue.dimension()) > self.threshold
    }

    fn perform(
        &mut self,
        tissue: &mut Tissue,
        cell: usize,
        state: &mut TissueState,
    ) -> Result<CompartmentOutcome> {
        let local = tissue
            .cell(cell)
            .longest_wall(tissue.walls(), state)
            .ok_or(TopologyError::CellNotFound(cell))?;
        let wall = tissue.wall(tissue.cell(cell).walls[local]);
        let a = position3(&state.vertex_data[wall.vertex1]);
        let b = position3(&state.vertex_data[wall.vertex2]);
        let axis = b - a;
        if axis.norm() < TOLERANCE {
            return Err(TopologyError::DegenerateWall {
                wall: wall.index,
                v1: wall.vertex1,
                v2: wall.vertex2,
            }
            .into());
        }
        let midpoint = 0.5 * (a + b);
        let plane_normal = tissue.cell(cell).normal(state, tissue.dimension());
        let cut_direction = plane_normal.cross(&axis);

        let cut = find_cut_pair(tissue, state, cell, &midpoint, &cut_direction)?;
        tracing::debug!(cell, threshold = self.threshold, "longest-wall division");
        divide_with_cut(tissue, state, cell, &cut, &self.volume_coupled, self.snap)
    }
}

/// Divides any cell above a volume threshold through its center, with the
/// new wall perpendicular to the cell's direction field. Cells without a
/// defined direction fall back to the longest-wall axis.
///
/// Parameters: `[volume_threshold, snap_fraction]`.
/// Indices: `[[direction_start_column], [volume-coupled cell columns...]]`.
pub struct DivisionVolumeViaDirection {
    threshold: f64,
    snap: f64,
    direction_column: usize,
    volume_coupled: Vec<usize>,
}

impl DivisionVolumeViaDirection {
    pub const ID: &'static str = "division::direction";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        crate::reaction::expect_parameters(Self::ID, spec, 2)?;
        crate::reaction::expect_index_levels(Self::ID, spec, 2)?;
        if spec.indices[0].len() != 1 {
            return Err(ConfigError::IndexShape {
                id: Self::ID,
                expected: vec![1],
                got: spec.indices.iter().map(Vec::len).collect(),
            }
            .into());
        }
        Ok(Self {
            threshold: spec.parameters[0],
            snap: spec.parameters[1],
            direction_column: spec.indices[0][0],
            volume_coupled: spec.indices[1].clone(),
        })
    }

    fn cell_axis(&self, tissue: &Tissue, state: &TissueState, cell: usize) -> Option<Vector3> {
        let dim = tissue.dimension();
        let row = &state.cell_data[cell];
        if row.len() <= self.direction_column + dim
            || row[self.direction_column + dim] < 0.5
        {
            return None;
        }
        let axis = position3(&row[self.direction_column..self.direction_column + dim]);
        (axis.norm() > TOLERANCE).then_some(axis)
    }
}

impl CompartmentChange for DivisionVolumeViaDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn flag(&self, tissue: &Tissue, cell: usize, state: &TissueState) -> bool {
        tissue.cell(cell).area(state, tissue.dimension()) > self.threshold
    }

    fn perform(
        &mut self,
        tissue: &mut Tissue,
        cell: usize,
        state: &mut TissueState,
    ) -> Result<CompartmentOutcome> {
        let axis = match self.cell_axis(tissue, state, cell) {
            Some(axis) => axis,
            None => {
                let local = tissue
                    .cell(cell)
                    .longest_wall(tissue.walls(), state)
                    .ok_or(TopologyError::CellNotFound(cell))?;
                let wall = tissue.wall(tissue.cell(cell).walls[local]);
                position3(&state.vertex_data[wall.vertex2])
                    - position3(&state.vertex_data[wall.vertex1])
            }
        };
        // The new wall runs perpendicular to the axis, through the center.
        let plane_normal = tissue.cell(cell).normal(state, tissue.dimension());
        let cut_direction = plane_normal.cross(&axis);
        let center = tissue.cell(cell).center(state);

        let cut = find_cut_pair(tissue, state, cell, &center, &cut_direction)?;
        tracing::debug!(cell, "direction-based division");
        divide_with_cut(tissue, state, cell, &cut, &self.volume_coupled, self.snap)
    }
}

/// Divides any cell above a volume threshold through its center along a
/// uniformly random in-plane line.
///
/// Parameters: `[volume_threshold, snap_fraction, seed]`.
/// Indices: `[[volume-coupled cell columns...]]`.
pub struct DivisionVolumeRandomDirection {
    threshold: f64,
    snap: f64,
    volume_coupled: Vec<usize>,
    rng: StdRng,
}

impl DivisionVolumeRandomDirection {
    pub const ID: &'static str = "division::random";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        crate::reaction::expect_parameters(Self::ID, spec, 3)?;
        crate::reaction::expect_index_levels(Self::ID, spec, 1)?;
        Ok(Self {
            threshold: spec.parameters[0],
            snap: spec.parameters[1],
            volume_coupled: spec.indices[0].clone(),
            rng: StdRng::seed_from_u64(spec.parameters[2] as u64),
        })
    }
}

impl CompartmentChange for DivisionVolumeRandomDirection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn flag(&self, tissue: &Tissue, cell: usize, state: &TissueState) -> bool {
        tissue.cell(cell).area(state, tissue.dimension()) > self.threshold
    }

    fn perform(
        &mut self,
        tissue: &mut Tissue,
        cell: usize,
        state: &mut TissueState,
    ) -> Result<CompartmentOutcome> {
        let frame = CellFrame::build(tissue, state, cell)?;
        let angle = self.rng.random_range(0.0..std::f64::consts::PI);
        let cut_direction = frame.u * angle.cos() + frame.v * angle.sin();
        let center = tissue.cell(cell).center(state);

        let cut = find_cut_pair(tissue, state, cell, &center, &cut_direction)?;
        tracing::debug!(cell, "random-direction division");
        divide_with_cut(tissue, state, cell, &cut, &self.volume_coupled, self.snap)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::fixtures;

    #[test]
    fn flag_compares_area_to_threshold() {
        let (tissue, state) = fixtures::single_square();
        let rule = DivisionVolumeViaLongestWall::from_spec(&ReactionSpec::new(
            "division::longest_wall",
            vec![0.5, 0.01],
            vec![vec![]],
        ))
        .unwrap();
        assert!(rule.flag(&tissue, 0, &state));

        let strict = DivisionVolumeViaLongestWall::from_spec(&ReactionSpec::new(
            "division::longest_wall",
            vec![2.0, 0.01],
            vec![vec![]],
        ))
        .unwrap();
        assert!(!strict.flag(&tissue, 0, &state));
    }

    #[test]
    fn longest_wall_division_splits_in_half() {
        let (mut tissue, mut state) = fixtures::single_square();
        // Stretch horizontally: walls along x become the longest.
        for row in &mut state.vertex_data {
            row[0] *= 2.0;
        }
        let mut rule = DivisionVolumeViaLongestWall::from_spec(&ReactionSpec::new(
            "division::longest_wall",
            vec![0.5, 0.01],
            vec![vec![]],
        ))
        .unwrap();

        let outcome = rule.perform(&mut tissue, 0, &mut state).unwrap();
        assert_eq!(outcome, CompartmentOutcome::CellAdded);
        assert_eq!(tissue.num_cells(), 2);

        let a0 = tissue.cell(0).area(&state, 2);
        let a1 = tissue.cell(1).area(&state, 2);
        assert!((a0 + a1 - 2.0).abs() < 1e-9);
        assert!((a0 - a1).abs() < 1e-9);
    }

    #[test]
    fn direction_division_cuts_across_the_axis() {
        let (mut tissue, mut state) = fixtures::single_square();
        for row in &mut state.cell_data {
            row.resize(5, 0.0);
        }
        // Direction along x, so the new wall runs along y.
        state.cell_data[0][2] = 1.0;
        state.cell_data[0][4] = 1.0;
        let mut rule = DivisionVolumeViaDirection::from_spec(&ReactionSpec::new(
            "division::direction",
            vec![0.5, 0.01],
            vec![vec![2], vec![]],
        ))
        .unwrap();

        rule.perform(&mut tissue, 0, &mut state).unwrap();
        assert_eq!(tissue.num_cells(), 2);
        // The separator is the last added wall: it must be vertical.
        let separator = tissue.wall(tissue.num_walls() - 1);
        let a = &state.vertex_data[separator.vertex1];
        let b = &state.vertex_data[separator.vertex2];
        assert!((a[0] - b[0]).abs() < 1e-9);
    }

    #[test]
    fn random_division_is_seeded() {
        let spec = ReactionSpec::new("division::random", vec![0.5, 0.01, 7.0], vec![vec![]]);
        let (mut tissue_a, mut state_a) = fixtures::single_square();
        let mut rule_a = DivisionVolumeRandomDirection::from_spec(&spec).unwrap();
        rule_a.perform(&mut tissue_a, 0, &mut state_a).unwrap();

        let (mut tissue_b, mut state_b) = fixtures::single_square();
        let mut rule_b = DivisionVolumeRandomDirection::from_spec(&spec).unwrap();
        rule_b.perform(&mut tissue_b, 0, &mut state_b).unwrap();

        assert_eq!(state_a.vertex_data, state_b.vertex_data);
    }

    #[test]
    fn compartment_scan_divides_through_tissue_api() {
        let (mut tissue, mut state) = fixtures::single_square();
        let rule = DivisionVolumeViaLongestWall::from_spec(&ReactionSpec::new(
            "division::longest_wall",
            vec![0.5, 0.01],
            vec![vec![]],
        ))
        .unwrap();
        tissue.add_compartment_change(Box::new(rule));

        let mutated = tissue.check_compartment_change(&mut state).unwrap();
        assert!(mutated);
        // Both halves are now at area 0.5 <= threshold; a second scan is
        // quiet.
        let mutated = tissue.check_compartment_change(&mut state).unwrap();
        assert!(!mutated);
        tissue.check_connectivity(false).unwrap();
    }
}
