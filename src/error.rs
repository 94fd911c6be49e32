//! Errors for integration methods

use crate::Float;

/// Errors surfaced to the caller.
///
/// Step rejections, Newton failures and singular iteration matrices inside a
/// step are recovered by the engines and never show up here; persistent
/// non-convergence is reported through [`crate::ErrorCode`] instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("max_retries must be positive (got {0})")]
    MaxRetriesMustBePositive(usize),
    #[error("newton_maxiter must be positive (got {0})")]
    NewtonMaxIterMustBePositive(usize),
    #[error("uround must be in (1e-35, 1.0) (got {0})")]
    URoundOutOfRange(Float),
    #[error("safety_factor must be in (1e-4, 1.0) (got {0})")]
    SafetyFactorOutOfRange(Float),
    #[error("beta must be in [0, 0.2] (got {0})")]
    BetaTooLarge(Float),
    #[error("invalid step scale bounds: need 0 < scale_min < 1 < scale_max (got {0}, {1})")]
    InvalidScaleFactors(Float, Float),
    #[error("step size must be finite and non-zero (got {0})")]
    InvalidStepSize(Float),
    #[error("tolerance must be finite and positive (got {0})")]
    InvalidTolerance(Float),
    #[error("dimension mismatch: expected {expected} components, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("cannot interpolate into the solver's live state buffer; pass a separate output buffer")]
    InterpolateIntoLiveState,
    #[error("solver is not attached to a model yet; call initialize or step first")]
    NotInitialized,
        #[error("singular matrix in LU factorization")]
    SingularMatrix,
}
