use cv_projective::DecompositionError;
use thiserror::Error;

/// Failure of the linear autocalibration or of reading intrinsics off its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AutoCalibrationError {
    /// The singular value decomposition of the constraint matrix hit the iteration limit.
    #[error("singular value decomposition of the constraints did not converge")]
    SvdNoConvergence,
    /// The eigendecomposition of the dual absolute quadric hit the iteration limit.
    #[error("eigendecomposition of the dual absolute quadric did not converge")]
    EigenNoConvergence,
    /// An upgraded camera or a projected quadric could not be decomposed into intrinsics.
    #[error("failed to decompose upgraded camera: {0}")]
    Decomposition(#[from] DecompositionError),
}
