//! Error types for the lifecycle pipeline

use thiserror::Error;

use crate::provider::ProviderError;

/// Pipeline result type
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors that can abort a lifecycle operation
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Provider API fault. Fatal unless the retry layer classified it
    /// retryable (timeout kind only).
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The readiness retry budget was exhausted
    #[error("instance did not become ready within {timeout} seconds")]
    InstanceReadyTimeout {
        /// The configured instance-ready timeout (seconds)
        timeout: u64,
    },

    /// A referenced elastic IP does not exist. Raised only after the
    /// instance has been rolled back (terminated).
    #[error("elastic IP not found: {0}")]
    ElasticIpNotFound(String),

    /// An operation that requires a live instance id was invoked on a
    /// machine record without one
    #[error("machine has no instance id")]
    MissingInstanceId,

    /// Local persistence fault (machine data directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
