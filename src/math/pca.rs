use crate::error::{Result, TopologyError};

use super::{Matrix3, Vector3, TOLERANCE};

/// Best-fit plane through a point cloud, computed by principal component
/// analysis of the centered covariance matrix.
///
/// The two in-plane axes are the dominant principal directions and the
/// normal is the direction of least variance. Used as a local 2D frame for
/// three-dimensional cells.
#[derive(Debug, Clone)]
pub struct PcaPlane {
    centroid: Vector3,
    axis1: Vector3,
    axis2: Vector3,
    normal: Vector3,
}

impl PcaPlane {
    /// Fits a plane through `points`.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than three points are given or the points
    /// are collinear (no plane is defined).
    pub fn fit(points: &[Vector3]) -> Result<Self> {
        if points.len() < 3 {
            return Err(TopologyError::Invalid(format!(
                "PCA plane needs at least 3 points, got {}",
                points.len()
            ))
            .into());
        }

        let mut centroid = Vector3::zeros();
        for p in points {
            centroid += p;
        }
        centroid /= points.len() as f64;

        let mut cov = Matrix3::zeros();
        for p in points {
            let d = p - centroid;
            cov += d * d.transpose();
        }
        cov /= points.len() as f64;

        let eigen = nalgebra::SymmetricEigen::new(cov);

        // Sort principal directions by descending variance.
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if eigen.eigenvalues[order[1]] < TOLERANCE {
            return Err(TopologyError::Invalid("PCA plane of collinear points".into()).into());
        }

        let axis1 = eigen.eigenvectors.column(order[0]).into_owned();
        let axis2 = eigen.eigenvectors.column(order[1]).into_owned();
        let mut normal = axis1.cross(&axis2);
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(TopologyError::Invalid("degenerate PCA basis".into()).into());
        }
        normal /= len;

        Ok(Self {
            centroid,
            axis1,
            axis2,
            normal,
        })
    }

    /// Returns the centroid of the fitted points.
    #[must_use]
    pub fn centroid(&self) -> &Vector3 {
        &self.centroid
    }

    /// Returns the dominant in-plane axis.
    #[must_use]
    pub fn axis1(&self) -> &Vector3 {
        &self.axis1
    }

    /// Returns the secondary in-plane axis.
    #[must_use]
    pub fn axis2(&self) -> &Vector3 {
        &self.axis2
    }

    /// Returns the plane normal (direction of least variance).
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Projects a point into the plane's `(u, v)` coordinates.
    #[must_use]
    pub fn project(&self, p: &Vector3) -> (f64, f64) {
        let d = p - self.centroid;
        (d.dot(&self.axis1), d.dot(&self.axis2))
    }
}

/// Principal axis of a symmetric 2x2 tensor `[[xx, xy], [xy, yy]]`.
///
/// Returns the unit eigenvector of the larger eigenvalue, embedded in the
/// XY plane. Used for strain- and stress-derived direction fields.
#[must_use]
pub fn principal_axis_2d(xx: f64, xy: f64, yy: f64) -> Vector3 {
    let theta = 0.5 * (2.0 * xy).atan2(xx - yy);
    Vector3::new(theta.cos(), theta.sin(), 0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plane_of_xy_points() {
        let pts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let plane = PcaPlane::fit(&pts).unwrap();
        assert!((plane.normal().z.abs() - 1.0).abs() < 1e-9);
        assert!(plane.normal().x.abs() < 1e-9);
        assert!((plane.centroid().x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn plane_of_tilted_points() {
        // Points on the plane z = x.
        let pts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        let plane = PcaPlane::fit(&pts).unwrap();
        let expected = Vector3::new(-1.0, 0.0, 1.0).normalize();
        let dot = plane.normal().dot(&expected).abs();
        assert!((dot - 1.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_points_fail() {
        let pts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        ];
        assert!(PcaPlane::fit(&pts).is_err());
    }

    #[test]
    fn too_few_points_fail() {
        let pts = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)];
        assert!(PcaPlane::fit(&pts).is_err());
    }

    #[test]
    fn project_recovers_uv() {
        let pts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        ];
        let plane = PcaPlane::fit(&pts).unwrap();
        let (u, v) = plane.project(&Vector3::new(1.0, 1.0, 0.0));
        assert!(u.abs() < 1e-9);
        assert!(v.abs() < 1e-9);
    }

    #[test]
    fn principal_axis_of_stretched_tensor() {
        let axis = principal_axis_2d(2.0, 0.0, 1.0);
        assert!((axis.x.abs() - 1.0).abs() < 1e-9);
        assert!(axis.y.abs() < 1e-9);
    }

    #[test]
    fn principal_axis_of_sheared_tensor() {
        // Pure shear: principal axis at 45 degrees.
        let axis = principal_axis_2d(1.0, 1.0, 1.0);
        assert!((axis.x - axis.y).abs() < 1e-9);
    }
}
