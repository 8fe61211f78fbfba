use super::{Vector3, TOLERANCE};

/// Computes the signed area of a polygon in the XY plane (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area_2d(points: &[Vector3]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Computes the area of a 3D polygon (coplanar points).
///
/// Uses the cross-product summation method projected along the polygon normal.
#[must_use]
pub fn polygon_area_3d(points: &[Vector3], normal: &Vector3) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut cross_sum = Vector3::new(0.0, 0.0, 0.0);
    let o = &points[0];
    for i in 1..n {
        let a = points[i] - o;
        let b = points[(i + 1) % n] - o;
        cross_sum += a.cross(&b);
    }
    0.5 * cross_sum.dot(normal).abs()
}

/// Arithmetic mean of a set of points.
///
/// This is the cell-center definition used throughout the kernel (division
/// lines, removal thresholds, the center triangulation).
#[must_use]
pub fn vertex_mean(points: &[Vector3]) -> Vector3 {
    if points.is_empty() {
        return Vector3::zeros();
    }
    let mut sum = Vector3::zeros();
    for p in points {
        sum += p;
    }
    sum / points.len() as f64
}

/// Area of the triangle spanned by three points (2D or 3D).
#[must_use]
pub fn triangle_area(a: &Vector3, b: &Vector3, c: &Vector3) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

/// Triangle area from its three side lengths (Heron's formula).
///
/// Returns 0 for side lengths that violate the triangle inequality within
/// floating tolerance.
#[must_use]
pub fn heron_area(a: f64, b: f64, c: f64) -> f64 {
    let s = 0.5 * (a + b + c);
    let under = s * (s - a) * (s - b) * (s - c);
    if under <= 0.0 {
        0.0
    } else {
        under.sqrt()
    }
}

/// Cotangent of the triangle angle opposite side `a`, from side lengths.
///
/// `cot(alpha) = (b^2 + c^2 - a^2) / (4 * area)`.
#[must_use]
pub fn cotangent_opposite(a: f64, b: f64, c: f64) -> f64 {
    let area = heron_area(a, b, c);
    if area < TOLERANCE {
        return 0.0;
    }
    (b * b + c * c - a * a) / (4.0 * area)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> Vector3 {
        Vector3::new(x, y, 0.0)
    }

    // ── signed_area_2d ──

    #[test]
    fn signed_area_ccw_square() {
        let pts = vec![v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)];
        assert!((signed_area_2d(&pts) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_cw_square() {
        let pts = vec![v(0.0, 0.0), v(0.0, 1.0), v(1.0, 1.0), v(1.0, 0.0)];
        assert!((signed_area_2d(&pts) + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_degenerate() {
        assert!(signed_area_2d(&[v(0.0, 0.0)]).abs() < TOLERANCE);
        assert!(signed_area_2d(&[]).abs() < TOLERANCE);
    }

    // ── polygon_area_3d ──

    #[test]
    fn tilted_square_area() {
        let pts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let normal = Vector3::new(-1.0, 0.0, 1.0).normalize();
        let expected = 2.0_f64.sqrt();
        assert!((polygon_area_3d(&pts, &normal) - expected).abs() < 1e-9);
    }

    // ── vertex_mean ──

    #[test]
    fn mean_of_square() {
        let pts = vec![v(0.0, 0.0), v(2.0, 0.0), v(2.0, 2.0), v(0.0, 2.0)];
        let m = vertex_mean(&pts);
        assert!((m.x - 1.0).abs() < TOLERANCE);
        assert!((m.y - 1.0).abs() < TOLERANCE);
    }

    // ── triangle helpers ──

    #[test]
    fn triangle_area_345() {
        let area = triangle_area(&v(0.0, 0.0), &v(4.0, 0.0), &v(0.0, 3.0));
        assert!((area - 6.0).abs() < TOLERANCE);
    }

    #[test]
    fn heron_matches_coordinates() {
        let area = heron_area(3.0, 4.0, 5.0);
        assert!((area - 6.0).abs() < TOLERANCE);
    }

    #[test]
    fn heron_degenerate_is_zero() {
        assert!(heron_area(1.0, 1.0, 2.0).abs() < 1e-6);
        assert!(heron_area(1.0, 1.0, 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn cotangent_right_angle() {
        // 3-4-5 triangle: the angle opposite the hypotenuse is 90 degrees.
        assert!(cotangent_opposite(5.0, 3.0, 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn cotangent_equilateral() {
        let expected = 1.0 / 3.0_f64.sqrt();
        assert!((cotangent_opposite(1.0, 1.0, 1.0) - expected).abs() < 1e-9);
    }
}
