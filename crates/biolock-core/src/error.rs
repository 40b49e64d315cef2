//! Error types for the biometric lock guard

use thiserror::Error;

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors returned by the lock guard to its immediate caller
///
/// None of these are retried internally. `CapabilityUnavailable` is not
/// retryable without user action outside the app; the others are.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// No biometric hardware, or nothing enrolled
    #[error("Biometric authentication is not available on this device")]
    CapabilityUnavailable,

    /// Proof-of-possession challenge declined or failed while enabling
    #[error("Authentication failed")]
    ChallengeFailed,

    /// Another challenge is already in flight on this guard
    #[error("An authentication attempt is already in progress")]
    AlreadyAuthenticating,

    /// The enabled flag could not be persisted
    #[error("Failed to persist biometric setting: {0}")]
    StoreWriteFailed(String),
}

impl LockError {
    /// Whether the caller may sensibly offer a "try again" affordance
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LockError::CapabilityUnavailable)
    }
}

/// Errors reported by a capability probe implementation
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Sensor or platform error
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// The platform did not answer within its own time budget
    #[error("Probe timed out")]
    Timeout,

    /// The platform cancelled the request
    #[error("Probe cancelled")]
    Cancelled,
}

/// Errors reported by a key-value store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for LockError {
    fn from(e: StoreError) -> Self {
        LockError::StoreWriteFailed(e.to_string())
    }
}

/// Errors loading or saving guard configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!LockError::CapabilityUnavailable.is_retryable());
        assert!(LockError::ChallengeFailed.is_retryable());
        assert!(LockError::AlreadyAuthenticating.is_retryable());
        assert!(LockError::StoreWriteFailed("disk full".into()).is_retryable());
    }

    #[test]
    fn test_store_error_maps_to_write_failure() {
        let err: LockError = StoreError::Backend("readonly".into()).into();
        assert_eq!(
            err,
            LockError::StoreWriteFailed("Store backend error: readonly".into())
        );
    }
}
