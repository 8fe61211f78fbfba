pub mod pca;
pub mod polygon;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 2D vector type.
pub type Vector2 = nalgebra::Vector2<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 matrix type.
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Lifts a position row of length 2 or 3 into a [`Vector3`].
///
/// Two-dimensional rows are padded with `z = 0`, so downstream geometry
/// (cross products, norms) is dimension-agnostic.
#[must_use]
pub fn position3(row: &[f64]) -> Vector3 {
    Vector3::new(
        row.first().copied().unwrap_or(0.0),
        row.get(1).copied().unwrap_or(0.0),
        row.get(2).copied().unwrap_or(0.0),
    )
}

/// Writes the first `row.len()` components of `v` back into a position row.
pub fn store_position(row: &mut [f64], v: &Vector3) {
    for (slot, value) in row.iter_mut().zip([v.x, v.y, v.z]) {
        *slot = value;
    }
}

/// Euclidean distance between two position rows.
#[must_use]
pub fn row_distance(a: &[f64], b: &[f64]) -> f64 {
    (position3(a) - position3(b)).norm()
}
