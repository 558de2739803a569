use nalgebra::{Matrix3, Matrix3x4};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Changes of image coordinates applied to a projection matrix before linear constraints are
/// built from it.
///
/// A projection in pixel coordinates mixes quantities of order `1` with quantities of order
/// `width^2`, which makes the resulting homogeneous systems badly conditioned. Both variants
/// describe an image transformation `T`. Normalizing maps `P` to `T^-1 * P` and denormalizing
/// maps it back with `T * P`.
///
/// No validation is done on the image size. A zero-sized image produces non-finite entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum ImageNormalization {
    /// Scales both axes by `width + height` and moves the image centre to the origin,
    /// so that image coordinates end up roughly within `[-0.5, 0.5]`.
    Conditioning,
    /// Only moves the image centre to the origin, which removes the principal point of a
    /// camera whose principal point is dead centre.
    Centering,
}

impl ImageNormalization {
    /// The image transformation `T` for an image of the given size.
    ///
    /// ```
    /// use cv_projective::ImageNormalization;
    /// use cv_projective::nalgebra::Vector3;
    /// let t = ImageNormalization::Centering.transform(1000.0, 800.0);
    /// assert_eq!(t * Vector3::new(0.0, 0.0, 1.0), Vector3::new(500.0, 400.0, 1.0));
    /// ```
    #[rustfmt::skip]
    pub fn transform(self, width: f64, height: f64) -> Matrix3<f64> {
        let scale = match self {
            Self::Conditioning => width + height,
            Self::Centering => 1.0,
        };
        Matrix3::new(
            scale, 0.0,   width / 2.0,
            0.0,   scale, height / 2.0,
            0.0,   0.0,   1.0,
        )
    }

    /// The inverse of [`ImageNormalization::transform`], computed in closed form.
    #[rustfmt::skip]
    pub fn inverse_transform(self, width: f64, height: f64) -> Matrix3<f64> {
        let scale = match self {
            Self::Conditioning => width + height,
            Self::Centering => 1.0,
        };
        Matrix3::new(
            1.0 / scale, 0.0,         -width / (2.0 * scale),
            0.0,         1.0 / scale, -height / (2.0 * scale),
            0.0,         0.0,         1.0,
        )
    }

    /// Moves a projection from pixel coordinates into normalized image coordinates.
    pub fn normalize(self, p: &Matrix3x4<f64>, width: f64, height: f64) -> Matrix3x4<f64> {
        self.inverse_transform(width, height) * p
    }

    /// Moves a projection from normalized image coordinates back into pixel coordinates.
    ///
    /// ```
    /// use cv_projective::ImageNormalization;
    /// use cv_projective::nalgebra::Matrix3x4;
    /// let p = Matrix3x4::new(
    ///     900.0, 0.0, 500.0, 10.0,
    ///     0.0, 900.0, 400.0, 20.0,
    ///     0.0, 0.0, 1.0, 3.0,
    /// );
    /// let normalization = ImageNormalization::Conditioning;
    /// let normalized = normalization.normalize(&p, 1000.0, 800.0);
    /// let restored = normalization.denormalize(&normalized, 1000.0, 800.0);
    /// assert!((restored - p).norm() < 1e-9);
    /// ```
    pub fn denormalize(self, p: &Matrix3x4<f64>, width: f64, height: f64) -> Matrix3x4<f64> {
        self.transform(width, height) * p
    }
}
