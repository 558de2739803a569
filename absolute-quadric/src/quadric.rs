use cv_projective::nalgebra::{Matrix3, Matrix3x4, Matrix4, SVector, Vector4};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Position of every entry of the symmetric 4x4 matrix in the packed parameter vector.
#[rustfmt::skip]
const PACKED: [[usize; 4]; 4] = [
    [0, 1, 2, 3],
    [1, 4, 5, 6],
    [2, 5, 7, 8],
    [3, 6, 8, 9],
];

/// The dual absolute quadric `Q`, a symmetric 4x4 matrix stored as the 10 entries of its upper
/// triangle in row-major order:
///
/// `(Q00, Q01, Q02, Q03, Q11, Q12, Q13, Q22, Q23, Q33)`
///
/// In a metric frame `Q` is `diag(1, 1, 1, 0)`. In a projective frame it is `H * diag(1, 1, 1, 0) * H^T`
/// for the transformation `H` that upgrades the frame, and it projects into every camera `P` as
/// the dual image of the absolute conic `P * Q * P^T`, which is proportional to `K * K^T`.
///
/// Like any homogeneous quantity it is only defined up to a non-zero scale, including its sign.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct DualAbsoluteQuadric(pub SVector<f64, 10>);

impl DualAbsoluteQuadric {
    /// Number of linear parameters of the quadric.
    pub const PARAMETERS: usize = 10;

    /// The quadric of a metric frame, `diag(1, 1, 1, 0)`.
    pub fn metric() -> Self {
        Self::from_matrix(&Matrix4::from_diagonal(&Vector4::new(1.0, 1.0, 1.0, 0.0)))
    }

    /// Packs the upper triangle of `q`. The lower triangle is ignored.
    ///
    /// ```
    /// use absolute_quadric::DualAbsoluteQuadric;
    /// use absolute_quadric::nalgebra::Matrix4;
    /// let q = Matrix4::new(
    ///     1.0, 2.0, 3.0, 4.0,
    ///     2.0, 5.0, 6.0, 7.0,
    ///     3.0, 6.0, 8.0, 9.0,
    ///     4.0, 7.0, 9.0, 10.0,
    /// );
    /// let packed = DualAbsoluteQuadric::from_matrix(&q);
    /// assert_eq!(packed.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    /// assert_eq!(packed.matrix(), q);
    /// ```
    pub fn from_matrix(q: &Matrix4<f64>) -> Self {
        let mut packed = SVector::zeros();
        for i in 0..4 {
            for j in i..4 {
                packed[PACKED[i][j]] = q[(i, j)];
            }
        }
        Self(packed)
    }

    /// Expands the packed parameters into the symmetric 4x4 matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        Matrix4::from_fn(|i, j| self.0[PACKED[i][j]])
    }

    /// The symmetric matrix of the `k`-th basis vector of the parameter space.
    ///
    /// It has a `1` at the one or two positions that parameter `k` occupies and zeros elsewhere.
    pub fn basis(k: usize) -> Matrix4<f64> {
        Matrix4::from_fn(|i, j| if PACKED[i][j] == k { 1.0 } else { 0.0 })
    }

    /// Projects the quadric into the camera `p`, giving the dual image of the absolute conic
    /// `P * Q * P^T`.
    pub fn project(&self, p: &Matrix3x4<f64>) -> Matrix3<f64> {
        p * self.matrix() * p.transpose()
    }
}
