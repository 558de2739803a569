use crate::DualAbsoluteQuadric;
use arrayvec::ArrayVec;
use cv_projective::nalgebra::{Matrix3x4, SVector};
use cv_projective::ImageNormalization;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A single linear equation `row * q = 0` on the packed dual absolute quadric `q`.
pub type QuadricConstraint = SVector<f64, 10>;

/// The coefficients of the entry `(i, j)` of `w = P * Q * P^T` as a linear function of the
/// packed quadric.
///
/// The bilinear form is evaluated once per basis vector of the parameter space, so that
/// `diac_coefficients(p, i, j).dot(&q)` equals `(p * Q * p^T)[(i, j)]`.
pub fn diac_coefficients(p: &Matrix3x4<f64>, i: usize, j: usize) -> QuadricConstraint {
    SVector::from_fn(|k, _| {
        (p.row(i) * DualAbsoluteQuadric::basis(k) * p.row(j).transpose())[(0, 0)]
    })
}

/// Standard deviations of the prior on the camera intrinsics, expressed in normalized image
/// coordinates.
///
/// Each weighted constraint is divided by its deviation and by `nu`. The defaults are those of
/// Pollefeys et al. 2002: a focal length of about the image size give or take a factor of
/// three, a unit aspect ratio, no skew and a principal point near the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ConstraintWeights {
    pub nu: f64,
    pub focal: f64,
    pub aspect: f64,
    pub skew: f64,
    pub principal_point: f64,
}

impl Default for ConstraintWeights {
    fn default() -> Self {
        Self {
            nu: 1.0,
            focal: 9.0,
            aspect: 0.2,
            skew: 0.01,
            principal_point: 0.1,
        }
    }
}

/// Which assumptions on the intrinsics are turned into linear constraints for each camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum ConstraintPolicy {
    /// Six rows per camera weighted by [`ConstraintWeights`], built after
    /// [`ImageNormalization::Conditioning`]:
    ///
    /// `(w00 - w22) / focal`, `(w11 - w22) / focal`, `(w00 - w11) / aspect`, `w01 / skew`,
    /// `w02 / principal_point`, `w12 / principal_point`, all divided by `nu`.
    Weighted,
    /// Four unscaled rows per camera, built after [`ImageNormalization::Centering`]:
    ///
    /// `w00 - w11`, `w01`, `w02`, `w12`.
    ///
    /// This only assumes square pixels, zero skew and a centred principal point, so it is exact
    /// for any focal length. It has no information to balance the rows against each other.
    Legacy,
}

impl ConstraintPolicy {
    /// The image normalization that the rows of this policy are designed for.
    pub fn normalization(self) -> ImageNormalization {
        match self {
            Self::Weighted => ImageNormalization::Conditioning,
            Self::Legacy => ImageNormalization::Centering,
        }
    }

    /// Number of rows added for every camera.
    pub fn rows_per_camera(self) -> usize {
        match self {
            Self::Weighted => 6,
            Self::Legacy => 4,
        }
    }

    /// Builds the rows for the camera `p`, which must already be normalized with
    /// [`ConstraintPolicy::normalization`].
    ///
    /// `weights` is only used by [`ConstraintPolicy::Weighted`].
    pub fn constraints(
        self,
        p: &Matrix3x4<f64>,
        weights: &ConstraintWeights,
    ) -> ArrayVec<QuadricConstraint, 6> {
        let w00 = diac_coefficients(p, 0, 0);
        let w11 = diac_coefficients(p, 1, 1);
        let w01 = diac_coefficients(p, 0, 1);
        let w02 = diac_coefficients(p, 0, 2);
        let w12 = diac_coefficients(p, 1, 2);
        match self {
            Self::Weighted => {
                let w22 = diac_coefficients(p, 2, 2);
                let nu = weights.nu;
                [
                    (w00 - w22) / weights.focal / nu,
                    (w11 - w22) / weights.focal / nu,
                    (w00 - w11) / weights.aspect / nu,
                    w01 / weights.skew / nu,
                    w02 / weights.principal_point / nu,
                    w12 / weights.principal_point / nu,
                ]
                .into_iter()
                .collect()
            }
            Self::Legacy => [w00 - w11, w01, w02, w12].into_iter().collect(),
        }
    }
}

impl Default for ConstraintPolicy {
    fn default() -> Self {
        Self::Weighted
    }
}
