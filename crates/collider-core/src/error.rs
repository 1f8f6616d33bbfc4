/// Errors reported by the storage system under test.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A session could not be established.
    #[error("Unable to connect to {endpoints:?}")]
    ConnectionFailed {
        endpoints: Vec<String>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A round-trip did not complete within the configured bound.
    #[error("Operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// The server rejected or failed the statement.
    #[error("Unable to run statement: '{0}'")]
    Statement(String),

    /// The store cannot execute this kind of statement.
    #[error("Unsupported statement: {0}")]
    Unsupported(String),

    /// Other store-specific error.
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. } | StoreError::Timeout { .. }
        )
    }
}

/// Errors that stop a run before any worker starts.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ColliderError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] collider_config::ConfigError),

    /// Storage error outside of any worker.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A worker task panicked or was cancelled.
    #[error("Worker {worker} did not finish: {reason}")]
    Join { worker: usize, reason: String },
}
