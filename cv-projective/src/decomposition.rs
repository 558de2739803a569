use crate::DecompositionError;
use log::*;
use nalgebra::{Matrix3, Matrix3x4, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The factors of a projection matrix `P = K * [R | t]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraDecomposition {
    /// Upper triangular intrinsic matrix with a positive diagonal and `k[(2, 2)] == 1`.
    pub k: Matrix3<f64>,
    /// Orthonormal rotation.
    pub r: Matrix3<f64>,
    /// Translation, solved for before `k` was normalized.
    ///
    /// Because of that, `k * [r | t]` equals the decomposed projection divided by the original
    /// `(2, 2)` entry of the upper triangular factor, not the projection itself.
    pub t: Vector3<f64>,
}

impl CameraDecomposition {
    /// Recomposes `K * [R | t]`.
    pub fn projection(&self) -> Matrix3x4<f64> {
        p_from_krt(&self.k, &self.r, &self.t)
    }
}

/// Creates the projection matrix `K * [R | t]`.
pub fn p_from_krt(k: &Matrix3<f64>, r: &Matrix3<f64>, t: &Vector3<f64>) -> Matrix3x4<f64> {
    let mut rt = Matrix3x4::zeros();
    rt.fixed_slice_mut::<3, 3>(0, 0).copy_from(r);
    rt.set_column(3, t);
    k * rt
}

/// Givens rotation in the plane of the axes `a` and `b`, with the cosine `c` on the diagonal
/// and `-s` at `(a, b)`.
fn givens(a: usize, b: usize, c: f64, s: f64) -> Matrix3<f64> {
    let mut g = Matrix3::identity();
    g[(a, a)] = c;
    g[(b, b)] = c;
    g[(a, b)] = -s;
    g[(b, a)] = s;
    g
}

/// Decomposes a projection matrix into intrinsics, rotation and translation.
///
/// This performs the RQ decomposition of HZ A4.1.1 on the left 3x3 block of `p` by zeroing
/// `(2, 1)`, `(2, 0)` and `(1, 0)` in that order with Givens rotations. Sign ambiguities are
/// then resolved by making the diagonal of `K` positive, starting with `K[(2, 2)]`. Finally the
/// translation is solved for and `K` is scaled so that `K[(2, 2)] == 1`. The translation is
/// not rescaled along with it.
///
/// The determinant of `R` ends at `+1` for any projection whose left block has a positive
/// determinant. This is not checked.
///
/// Fails with [`DecompositionError::SingularIntrinsics`] if the upper triangular factor is
/// singular, which means the camera is degenerate.
///
/// ```
/// use cv_projective::{krt_from_p, p_from_krt};
/// use cv_projective::nalgebra::{Matrix3, Rotation3, Vector3};
/// let k = Matrix3::new(
///     800.0, 1.5, 640.0,
///     0.0, 780.0, 360.0,
///     0.0, 0.0, 1.0,
/// );
/// let r = *Rotation3::from_euler_angles(0.1, 0.2, -0.05).matrix();
/// let t = Vector3::new(-0.2, 0.1, 1.5);
/// let decomposition = krt_from_p(&p_from_krt(&k, &r, &t)).unwrap();
/// assert!((decomposition.k - k).norm() < 1e-6);
/// assert!((decomposition.r - r).norm() < 1e-9);
/// assert!((decomposition.t - t).norm() < 1e-9);
/// ```
pub fn krt_from_p(p: &Matrix3x4<f64>) -> Result<CameraDecomposition, DecompositionError> {
    let mut k: Matrix3<f64> = p.fixed_slice::<3, 3>(0, 0).into_owned();
    let mut q = Matrix3::identity();

    // Set K(2,1) to zero.
    if k[(2, 1)] != 0.0 {
        let (c, s) = normalized_pair(-k[(2, 2)], k[(2, 1)]);
        let qx = givens(1, 2, c, s);
        k *= qx;
        q = qx.transpose() * q;
    } else {
        trace!("rq: (2, 1) already zero");
    }
    // Set K(2,0) to zero.
    if k[(2, 0)] != 0.0 {
        let (c, s) = normalized_pair(k[(2, 2)], k[(2, 0)]);
        let qy = givens(2, 0, c, s);
        k *= qy;
        q = qy.transpose() * q;
    } else {
        trace!("rq: (2, 0) already zero");
    }
    // Set K(1,0) to zero.
    if k[(1, 0)] != 0.0 {
        let (c, s) = normalized_pair(-k[(1, 1)], k[(1, 0)]);
        let qz = givens(0, 1, c, s);
        k *= qz;
        q = qz.transpose() * q;
    } else {
        trace!("rq: (1, 0) already zero");
    }

    let mut r = q;

    // Ensure that the diagonal is positive.
    if k[(2, 2)] < 0.0 {
        k = -k;
        r = -r;
    }
    if k[(1, 1)] < 0.0 {
        let s = Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, 1.0));
        k *= s;
        r = s * r;
    }
    if k[(0, 0)] < 0.0 {
        let s = Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0));
        k *= s;
        r = s * r;
    }

    let k_inv = k
        .try_inverse()
        .ok_or(DecompositionError::SingularIntrinsics)?;
    let t = k_inv * p.column(3);

    let k = k / k[(2, 2)];

    Ok(CameraDecomposition { k, r, t })
}

/// Normalizes `(c, s)` to unit length.
fn normalized_pair(c: f64, s: f64) -> (f64, f64) {
    let l = c.hypot(s);
    (c / l, s / l)
}
