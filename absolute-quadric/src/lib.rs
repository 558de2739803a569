//! Linear autocalibration of a projective reconstruction through the dual absolute quadric.
//!
//! A projective reconstruction is only defined up to a 4x4 transformation. If something is
//! known about the intrinsics of its cameras (zero skew, square pixels, a principal point near
//! the image centre, a plausible focal length) then each camera gives linear constraints on the
//! dual absolute quadric `Q`, and from `Q` follows the transformation `H` that takes the
//! reconstruction to a metric frame. See [`AutoCalibrationLinear`].
//!
//! Once upgraded, the camera intrinsics can be read off each camera with the decompositions
//! of `cv-projective`, which is re-exported as [`projective`].

mod calibration;
mod constraints;
mod error;
mod metric;
mod quadric;

pub use calibration::*;
pub use constraints::*;
pub use cv_projective as projective;
pub use cv_projective::nalgebra;
pub use error::*;
pub use metric::*;
pub use quadric::*;
