//! Error types for sentinel-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Discord API or gateway error
    #[error("discord error: {0}")]
    Discord(String),

    /// Command or identifier parsing error
    #[error("parse error: {0}")]
    Parse(String),

    /// The discipline engine rejected or failed a request
    #[error(transparent)]
    Engine(#[from] sentinel_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
