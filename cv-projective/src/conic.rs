use crate::DecompositionError;
use log::*;
use nalgebra::{Matrix3, Matrix3x4, Matrix4};

/// Reverses the row and column order of a 3x3 matrix (index `i` becomes `2 - i`).
///
/// Conjugating by the exchange matrix turns an upper triangular Cholesky problem into
/// the lower triangular one that nalgebra solves, and back.
fn flip(m: &Matrix3<f64>) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| m[(2 - i, 2 - j)])
}

/// Upper triangular Cholesky factor `U` with `U * U^T = m` and a positive diagonal.
fn upper_cholesky(m: &Matrix3<f64>) -> Result<Matrix3<f64>, DecompositionError> {
    let l = flip(m)
        .cholesky()
        .ok_or(DecompositionError::NotPositiveDefinite)?
        .l();
    let mut k = flip(&l);

    // Resolve sign ambiguities assuming positive diagonal.
    for j in 0..3 {
        if k[(j, j)] < 0.0 {
            k.column_mut(j).neg_mut();
        }
    }
    Ok(k)
}

/// Recovers the intrinsic matrix `K` from the image of the dual absolute quadric `K * K^T`.
///
/// This stays in the dual space, so no inverse is taken. The input only needs to be
/// proportional to `K * K^T` with a positive factor; the result is then `K` scaled by the
/// square root of that factor.
///
/// Fails with [`DecompositionError::NotPositiveDefinite`] if the input is not
/// positive-definite, which happens when the quadric it came from is degenerate.
///
/// ```
/// use cv_projective::k_from_image_of_dual_absolute_quadric;
/// use cv_projective::nalgebra::Matrix3;
/// let k = Matrix3::new(
///     10.0, 1.0, 30.0,
///     0.0, 20.0, 40.0,
///     0.0, 0.0, 1.0,
/// );
/// let recovered = k_from_image_of_dual_absolute_quadric(&(k * k.transpose())).unwrap();
/// assert!((recovered - k).norm() < 1e-9);
/// ```
pub fn k_from_image_of_dual_absolute_quadric(
    kkt: &Matrix3<f64>,
) -> Result<Matrix3<f64>, DecompositionError> {
    upper_cholesky(kkt)
}

/// Recovers the intrinsic matrix `K` from the image of the absolute conic `W = (K * K^T)^-1`.
///
/// `W` is dualized by inverting it and then handled like
/// [`k_from_image_of_dual_absolute_quadric`]. The two are equivalent in exact arithmetic, but
/// this one loses precision when `W` is close to singular.
///
/// ```
/// use cv_projective::k_from_absolute_conic;
/// use cv_projective::nalgebra::Matrix3;
/// let k = Matrix3::new(
///     10.0, 1.0, 30.0,
///     0.0, 20.0, 40.0,
///     0.0, 0.0, 1.0,
/// );
/// let w = (k * k.transpose()).try_inverse().unwrap();
/// let recovered = k_from_absolute_conic(&w).unwrap();
/// assert!((recovered - k).norm() < 1e-6);
/// ```
pub fn k_from_absolute_conic(w: &Matrix3<f64>) -> Result<Matrix3<f64>, DecompositionError> {
    let dual = w.try_inverse().ok_or(DecompositionError::SingularConic)?;
    upper_cholesky(&dual)
}

/// Recovers the intrinsic matrix of the camera `p` from the dual absolute quadric `q` expressed
/// in the same projective frame.
///
/// The quadric is projected into the image as `p * q * p^T` and normalized so that its `(2, 2)`
/// entry is `1`, which also cancels the arbitrary sign of `q`. The result is then decomposed
/// with [`k_from_image_of_dual_absolute_quadric`] and has `K[(2, 2)] == 1`.
pub fn k_from_projected_quadric(
    q: &Matrix4<f64>,
    p: &Matrix3x4<f64>,
) -> Result<Matrix3<f64>, DecompositionError> {
    let kkt = p * q * p.transpose();
    trace!("projected quadric scale: {}", kkt[(2, 2)]);
    k_from_image_of_dual_absolute_quadric(&(kkt / kkt[(2, 2)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn flip_is_an_involution() {
        let m = Matrix3::from_fn(|i, j| (3 * i + j) as f64);
        assert_eq!(flip(&flip(&m)), m);
        assert_eq!(flip(&m)[(0, 0)], m[(2, 2)]);
        assert_eq!(flip(&m)[(0, 1)], m[(2, 1)]);
    }

    #[test]
    fn scaled_dual_gives_scaled_k() {
        let k = Matrix3::new(800.0, 0.5, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0);
        let recovered = k_from_image_of_dual_absolute_quadric(&(k * k.transpose() * 4.0)).unwrap();
        assert_relative_eq!(recovered, k * 2.0, max_relative = 1e-9);
    }

    #[test]
    fn indefinite_dual_is_rejected() {
        let kkt = Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, 1.0));
        assert_eq!(
            k_from_image_of_dual_absolute_quadric(&kkt),
            Err(DecompositionError::NotPositiveDefinite)
        );
    }

    #[test]
    fn singular_conic_is_rejected() {
        let w = Matrix3::from_diagonal(&Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(
            k_from_absolute_conic(&w),
            Err(DecompositionError::SingularConic)
        );
    }

    #[test]
    fn negated_quadric_projects_to_same_k() {
        let k = Matrix3::new(500.0, 0.0, 250.0, 0.0, 500.0, 200.0, 0.0, 0.0, 1.0);
        let p = crate::p_from_krt(&k, &Matrix3::identity(), &Vector3::new(0.1, 0.2, 3.0));
        let q = Matrix4::from_diagonal(&nalgebra::Vector4::new(1.0, 1.0, 1.0, 0.0));
        let positive = k_from_projected_quadric(&q, &p).unwrap();
        let negative = k_from_projected_quadric(&(-q), &p).unwrap();
        assert_relative_eq!(positive, k, max_relative = 1e-9);
        assert_relative_eq!(negative, k, max_relative = 1e-9);
    }
}
