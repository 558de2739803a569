//! Error measures for judging recovered cameras against a known ground truth.

use nalgebra::Matrix3;

/// Frobenius norm of `a - b`.
pub fn frobenius_distance(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
    (a - b).norm()
}

/// Frobenius norm of `a - b` divided by the Frobenius norm of `a`.
///
/// This does not depend on the overall scale of the matrices as long as both carry the same
/// scale.
pub fn relative_frobenius_distance(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
    (a - b).norm() / a.norm()
}

/// How far `r` is from being proportional to an orthonormal matrix.
///
/// The Gram matrix `r * r^T` is divided by the mean of its diagonal and compared to the
/// identity. A scaled rotation gives `0.0`.
///
/// ```
/// use cv_projective::metrics::orthogonality_deviation;
/// use cv_projective::nalgebra::{Matrix3, Rotation3};
/// let r = Rotation3::from_euler_angles(0.3, -0.2, 1.0).matrix() * 7.0;
/// assert!(orthogonality_deviation(&r) < 1e-12);
/// assert!(orthogonality_deviation(&Matrix3::new(1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0)) > 0.5);
/// ```
pub fn orthogonality_deviation(r: &Matrix3<f64>) -> f64 {
    let gram = r * r.transpose();
    let mean_diagonal = gram.trace() / 3.0;
    frobenius_distance(&(gram / mean_diagonal), &Matrix3::identity())
}
