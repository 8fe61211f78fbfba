/// Per-entity variable matrices, kept parallel to the tissue's entity tables.
///
/// Row `i` of each matrix belongs to entity `i`. Rows may differ in length
/// across entities of the same kind (the center-triangulation payload makes
/// cell rows ragged), but a matrix and its derivative twin always share the
/// exact same shape.
///
/// Conventions baked into the rest of the kernel:
/// - `wall_data[i][0]` is wall `i`'s resting length;
/// - `vertex_data[i]` is vertex `i`'s position (length = spatial dimension).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TissueState {
    pub cell_data: Vec<Vec<f64>>,
    pub wall_data: Vec<Vec<f64>>,
    pub vertex_data: Vec<Vec<f64>>,
}

impl TissueState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a same-shape state with every slot set to zero.
    #[must_use]
    pub fn zeroed_like(&self) -> Self {
        let zero_rows = |m: &Vec<Vec<f64>>| m.iter().map(|r| vec![0.0; r.len()]).collect();
        Self {
            cell_data: zero_rows(&self.cell_data),
            wall_data: zero_rows(&self.wall_data),
            vertex_data: zero_rows(&self.vertex_data),
        }
    }

    /// Sets every slot to zero, keeping the shape.
    pub fn zero(&mut self) {
        for matrix in [
            &mut self.cell_data,
            &mut self.wall_data,
            &mut self.vertex_data,
        ] {
            for row in matrix.iter_mut() {
                row.fill(0.0);
            }
        }
    }

    /// Reshapes `self` to match `other`, dropping or zero-filling slots.
    ///
    /// Used by solvers to bring stage buffers back in line after a topology
    /// mutation resized the canonical matrices.
    pub fn resize_like(&mut self, other: &Self) {
        let fit = |dst: &mut Vec<Vec<f64>>, src: &Vec<Vec<f64>>| {
            dst.resize(src.len(), Vec::new());
            for (d, s) in dst.iter_mut().zip(src) {
                d.resize(s.len(), 0.0);
            }
        };
        fit(&mut self.cell_data, &other.cell_data);
        fit(&mut self.wall_data, &other.wall_data);
        fit(&mut self.vertex_data, &other.vertex_data);
    }

    /// Copies every slot from `src`. Shapes must already match.
    pub fn assign(&mut self, src: &Self) {
        let copy = |dst: &mut Vec<Vec<f64>>, s: &Vec<Vec<f64>>| {
            for (d, row) in dst.iter_mut().zip(s) {
                d.copy_from_slice(row);
            }
        };
        copy(&mut self.cell_data, &src.cell_data);
        copy(&mut self.wall_data, &src.wall_data);
        copy(&mut self.vertex_data, &src.vertex_data);
    }

    /// Adds `factor * src` into every slot. Shapes must already match.
    pub fn add_scaled(&mut self, src: &Self, factor: f64) {
        let axpy = |dst: &mut Vec<Vec<f64>>, s: &Vec<Vec<f64>>| {
            for (d, row) in dst.iter_mut().zip(s) {
                for (x, y) in d.iter_mut().zip(row) {
                    *x += factor * y;
                }
            }
        };
        axpy(&mut self.cell_data, &src.cell_data);
        axpy(&mut self.wall_data, &src.wall_data);
        axpy(&mut self.vertex_data, &src.vertex_data);
    }

    /// Adds `src` slot-wise. Shapes must already match.
    pub fn add(&mut self, src: &Self) {
        self.add_scaled(src, 1.0);
    }

    /// Adds `|src|` slot-wise. Shapes must already match.
    ///
    /// Accumulates absolute derivative magnitudes for the adaptive solver's
    /// error scale, where signed contributions may cancel.
    pub fn add_abs(&mut self, src: &Self) {
        let axpy = |dst: &mut Vec<Vec<f64>>, s: &Vec<Vec<f64>>| {
            for (d, row) in dst.iter_mut().zip(s) {
                for (x, y) in d.iter_mut().zip(row) {
                    *x += y.abs();
                }
            }
        };
        axpy(&mut self.cell_data, &src.cell_data);
        axpy(&mut self.wall_data, &src.wall_data);
        axpy(&mut self.vertex_data, &src.vertex_data);
    }

    /// Total number of scalar slots across all three matrices.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        let count = |m: &Vec<Vec<f64>>| m.iter().map(Vec::len).sum::<usize>();
        count(&self.cell_data) + count(&self.wall_data) + count(&self.vertex_data)
    }

    /// True when every slot is finite.
    #[must_use]
    pub fn all_finite(&self) -> bool {
        let ok = |m: &Vec<Vec<f64>>| m.iter().all(|r| r.iter().all(|x| x.is_finite()));
        ok(&self.cell_data) && ok(&self.wall_data) && ok(&self.vertex_data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> TissueState {
        TissueState {
            cell_data: vec![vec![1.0, 2.0], vec![3.0]],
            wall_data: vec![vec![4.0]],
            vertex_data: vec![vec![5.0, 6.0], vec![7.0, 8.0]],
        }
    }

    #[test]
    fn zeroed_like_preserves_shape() {
        let s = sample();
        let z = s.zeroed_like();
        assert_eq!(z.cell_data.len(), 2);
        assert_eq!(z.cell_data[0].len(), 2);
        assert_eq!(z.cell_data[1].len(), 1);
        assert_eq!(z.num_slots(), s.num_slots());
        assert!(z.cell_data.iter().flatten().all(|&x| x == 0.0));
    }

    #[test]
    fn add_scaled_accumulates() {
        let mut a = sample();
        let b = sample();
        a.add_scaled(&b, 0.5);
        assert!((a.cell_data[0][0] - 1.5).abs() < 1e-12);
        assert!((a.vertex_data[1][1] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn add_abs_ignores_sign() {
        let mut a = sample().zeroed_like();
        let mut b = sample();
        b.cell_data[0][0] = -2.0;
        a.add_abs(&b);
        assert!((a.cell_data[0][0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn resize_like_grows_and_shrinks() {
        let mut a = TissueState::new();
        let b = sample();
        a.resize_like(&b);
        assert_eq!(a.num_slots(), b.num_slots());

        let smaller = TissueState {
            cell_data: vec![vec![0.0]],
            wall_data: Vec::new(),
            vertex_data: Vec::new(),
        };
        a.resize_like(&smaller);
        assert_eq!(a.num_slots(), 1);
    }

    #[test]
    fn all_finite_detects_nan() {
        let mut s = sample();
        assert!(s.all_finite());
        s.wall_data[0][0] = f64::NAN;
        assert!(!s.all_finite());
    }
}
