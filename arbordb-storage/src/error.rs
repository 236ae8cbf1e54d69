use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid state")]
    InvalidState,
    // cache errors
    #[error("cache session limit exceeded")]
    SessionLimitExceeded,
    // eviction errors
    #[error("page eviction conflict")]
    EvictConflict,
    #[error("page reconciliation failed")]
    ReconcileFailed,
    #[error("tracked object discard failed")]
    TrackedDiscardFailed,
}

impl Error {
    /// Returns whether the error is the recoverable eviction outcome.
    /// The eviction policy retries such pages later instead of treating
    /// them as failures.
    #[inline]
    pub fn is_evict_conflict(&self) -> bool {
        matches!(self, Error::EvictConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evict_conflict_is_recoverable() {
        assert!(Error::EvictConflict.is_evict_conflict());
        assert!(!Error::ReconcileFailed.is_evict_conflict());
        assert!(!Error::InvalidState.is_evict_conflict());
    }
}
