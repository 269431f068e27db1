//! Service-specific error types

use thiserror::Error;

/// Errors from the contact form path.
///
/// Chat requests never produce these: the chat facade always answers with a
/// string, so only input parsing and contact storage can fail.
#[derive(Error, Debug)]
pub enum Error {
    #[error("contact store I/O failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("contact store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
