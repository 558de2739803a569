//! This crate contains the projective camera primitives needed to upgrade a projective
//! reconstruction into a metric one.
//!
//! A projective reconstruction gives us a set of 3x4 projection matrices `P` that are only known
//! up to an unknown 4x4 transformation shared by all cameras. Once that transformation has been
//! removed (see the `absolute-quadric` crate), the camera intrinsics `K`, rotation `R` and
//! translation `t` can be recovered from each projection with [`krt_from_p`]. Alternatively, the
//! intrinsics can be read straight off the image of the dual absolute quadric with
//! [`k_from_image_of_dual_absolute_quadric`] or [`k_from_projected_quadric`].
//!
//! Pixel coordinates make the linear systems built from projection matrices badly conditioned,
//! which is why [`ImageNormalization`] is provided to move a projection into (and back out of)
//! a coordinate system where the image has a size of about `1.0`.

mod conic;
mod decomposition;
mod error;
pub mod metrics;
mod normalization;

pub use conic::*;
pub use decomposition::*;
pub use error::*;
pub use nalgebra;
pub use normalization::*;

use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Matrix3x4, Point2, Vector2, Vector4};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A 3x4 camera projection matrix.
///
/// It maps homogeneous world points to homogeneous image points and is only defined up to scale.
/// In a projective reconstruction it is additionally only known up to a 4x4 transformation
/// shared by every camera of the reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ProjectionMatrix(pub Matrix3x4<f64>);

impl ProjectionMatrix {
    /// Creates the projection `K * [R | t]`.
    ///
    /// ```
    /// use cv_projective::ProjectionMatrix;
    /// use cv_projective::nalgebra::{Matrix3, Vector3};
    /// let p = ProjectionMatrix::from_krt(&Matrix3::identity(), &Matrix3::identity(), &Vector3::z());
    /// assert_eq!(p.column(3).into_owned(), Vector3::z());
    /// ```
    pub fn from_krt(k: &Matrix3<f64>, r: &Matrix3<f64>, t: &nalgebra::Vector3<f64>) -> Self {
        Self(p_from_krt(k, r, t))
    }

    /// Decomposes the projection into `K`, `R` and `t`. See [`krt_from_p`].
    pub fn decompose(&self) -> Result<CameraDecomposition, DecompositionError> {
        krt_from_p(&self.0)
    }

    /// Projects a homogeneous world point into the image.
    ///
    /// Returns `None` if the point lands at infinity in the image.
    pub fn project(&self, point: &Vector4<f64>) -> Option<Point2<f64>> {
        Point2::from_homogeneous(self.0 * point)
    }
}

/// This contains intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
///
/// Autocalibration recovers a full upper triangular `K`. This type gives names to its entries
/// so that the focal lengths, principal point and skew can be compared independently.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic matrix.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            skew: 0.0,
            principal_point: Point2::new(0.0, 0.0),
        }
    }

    /// Creates square-pixel intrinsics with the principal point in the middle of a
    /// `width` by `height` image.
    pub fn centered(focal: f64, width: f64, height: f64) -> Self {
        Self::identity()
            .focal(focal)
            .principal_point(Point2::new(width / 2.0, height / 2.0))
    }

    /// Reads the parameters out of an upper triangular intrinsic matrix.
    ///
    /// The matrix is first divided by its `(2, 2)` entry.
    ///
    /// ```
    /// use cv_projective::CameraIntrinsics;
    /// use cv_projective::nalgebra::{Point2, Vector2};
    /// let intrinsics = CameraIntrinsics {
    ///     focals: Vector2::new(800.0, 900.0),
    ///     principal_point: Point2::new(500.0, 600.0),
    ///     skew: 1.7,
    /// };
    /// let scaled = intrinsics.matrix() * 2.0;
    /// assert_eq!(CameraIntrinsics::from_matrix(&scaled), intrinsics);
    /// ```
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        let k = k / k[(2, 2)];
        Self {
            focals: Vector2::new(k[(0, 0)], k[(1, 1)]),
            principal_point: Point2::new(k[(0, 2)], k[(1, 2)]),
            skew: k[(0, 1)],
        }
    }

    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    pub fn skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    /// The ratio of the vertical to the horizontal focal length.
    pub fn aspect_ratio(&self) -> f64 {
        self.focals.y / self.focals.x
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  self.skew,      self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::identity()
    }
}
