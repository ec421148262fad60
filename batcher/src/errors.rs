use thiserror::Error;

/// Errors raised when building a [`BatchExecutor`](crate::BatchExecutor).
#[derive(Error, Debug, PartialEq)]
pub enum BatcherError {
    #[error("Name cannot be blank")]
    BlankName,

    #[error("Max batch size must be positive")]
    InvalidBatchSize,

    #[error("Flush timeout must be positive")]
    InvalidFlushTimeout,
}

/// Errors a resolver can report for one batch.
///
/// The executor never propagates these, a failed batch is logged and dropped.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Upstream request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream responded with status {0}")]
    UnexpectedStatus(u16),

    #[error("Upstream timeout")]
    Timeout,

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("Resolver error: {0}")]
    Other(String),
}
