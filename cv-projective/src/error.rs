use thiserror::Error;

/// Failure of one of the closed-form matrix decompositions.
///
/// None of these are recovered from internally. A failure usually means that the quadric or
/// projection fed in was degenerate, and the only remedy is to feed better conditioned input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecompositionError {
    /// The (flipped) image of the dual absolute quadric is not positive-definite, so it cannot
    /// be written as `K * K^T`.
    #[error("image of the dual absolute quadric is not positive-definite")]
    NotPositiveDefinite,
    /// The absolute conic could not be inverted into its dual.
    #[error("absolute conic is singular")]
    SingularConic,
    /// The upper triangular factor of the projection became singular, so the translation
    /// cannot be solved for.
    #[error("intrinsic matrix is singular")]
    SingularIntrinsics,
}
