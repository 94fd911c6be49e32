//! Status codes for integrators

/// Outcome of the most recent call to [`crate::AdaptiveSolver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    #[default]
    NoError,
    /// The local error never dropped below the tolerance within the retry
    /// budget. The last attempt was committed anyway.
    DidNotConverge,
    /// Reserved for event-location layers built on top of the interpolant.
    EventNotFound,
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == ErrorCode::NoError
    }
}
