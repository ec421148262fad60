use crate::config::ValidationError;
use batcher::BatcherError;
use thiserror::Error;

/// Result type alias for aggregation operations
pub type Result<T, E = AggregationError> = std::result::Result<T, E>;

/// Errors that can occur while serving aggregations
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("At least one of pricing, shipments or track must be provided")]
    NoCategories,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("Invalid executor settings: {0}")]
    Executor(#[from] BatcherError),

    #[error("Upstream URL cannot be used as a base: {0}")]
    InvalidUpstreamUrl(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
