use crate::{AutoCalibrationError, DualAbsoluteQuadric};
use cv_projective::nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector4};
use cv_projective::{k_from_projected_quadric, krt_from_p, CameraDecomposition};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The result of a linear autocalibration.
///
/// `transform` is the 4x4 matrix `H` that takes the projective frame to a metric one: cameras
/// are upgraded with `P * H` and points with `H^-1 * X`. Everything else is diagnostic
/// information about how far that transformation can be trusted.
///
/// The transformation acts on 3D space only, so it applies equally to the cameras as they were
/// added (in pixels) and to their normalized counterparts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MetricUpgrade {
    /// The metric upgrade `H`.
    pub transform: Matrix4<f64>,
    /// The dual absolute quadric as it came out of the nullspace, without any rank correction.
    pub quadric: DualAbsoluteQuadric,
    /// Eigenvalues of the quadric in descending order, with their sign resolved so that they
    /// sum to a non-negative value. The last one is the one replaced by `1` in `transform`.
    pub eigenvalues: Vector4<f64>,
    /// Number of eigenvalues above the rank tolerance times the largest one. A dual absolute
    /// quadric has rank `3`.
    pub rank: usize,
    /// The smallest singular value of the constraint matrix, or `0.0` when there were fewer
    /// constraints than quadric parameters.
    pub smallest_singular_value: f64,
    /// Number of constraint rows the quadric was solved from.
    pub num_constraints: usize,
}

impl MetricUpgrade {
    /// Upgrades a projective camera: `P * H`.
    pub fn upgrade_projection(&self, p: &Matrix3x4<f64>) -> Matrix3x4<f64> {
        p * self.transform
    }

    /// Upgrades a homogeneous projective point: `H^-1 * X`.
    ///
    /// Returns `None` if `H` is not invertible.
    pub fn upgrade_point(&self, x: &Vector4<f64>) -> Option<Vector4<f64>> {
        self.transform.try_inverse().map(|inverse| inverse * x)
    }

    /// Upgrades the projective camera `p` and decomposes it into `K`, `R` and `t`.
    ///
    /// The rotation may have a determinant of `-1` since the metric frame is only defined up
    /// to a reflection.
    pub fn intrinsics(
        &self,
        p: &Matrix3x4<f64>,
    ) -> Result<CameraDecomposition, AutoCalibrationError> {
        Ok(krt_from_p(&self.upgrade_projection(p))?)
    }

    /// Reads the intrinsics of the projective camera `p` straight off the projection of the
    /// quadric `P * Q * P^T`, without going through `transform`.
    pub fn intrinsics_from_quadric(
        &self,
        p: &Matrix3x4<f64>,
    ) -> Result<Matrix3<f64>, AutoCalibrationError> {
        Ok(k_from_projected_quadric(&self.quadric.matrix(), p)?)
    }

    /// Whether the solve was overdetermined and the quadric came out with rank `3`.
    ///
    /// An unreliable upgrade is still returned as-is. It is up to the caller to reject it.
    pub fn is_reliable(&self) -> bool {
        self.rank == 3 && self.num_constraints >= DualAbsoluteQuadric::PARAMETERS
    }
}
