//! Failure taxonomy for a single dispatch

/// Why one credential did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("backend returned an empty answer")]
    EmptySuccess,
}

impl AttemptFailure {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptFailure::QuotaExceeded(_) => "quota_exceeded",
            AttemptFailure::Transient(_) => "transient",
            AttemptFailure::EmptySuccess => "empty",
        }
    }
}

/// A failed attempt and the pool index of the credential it used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    pub credential_index: usize,
    pub failure: AttemptFailure,
}

/// Terminal dispatch errors. Never shown to end users; the dispatcher and
/// facade turn them into `FALLBACK_MESSAGE`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pool exhausted: {} credential(s) tried, none produced an answer", failures.len())]
    PoolExhausted { failures: Vec<FailedAttempt> },
}

/// Result alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;
