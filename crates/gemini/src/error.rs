//! Error types for backend construction

/// Errors from building a backend. Request-time failures are never errors;
/// they are reported as `AttemptOutcome` variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP client build failed: {0}")]
    Client(String),
}

/// Result alias for backend construction.
pub type Result<T> = std::result::Result<T, Error>;
