//! Generation backend abstraction
//!
//! Defines the `Backend` trait that decouples the failover loop from the
//! concrete text-generation service. A backend performs exactly one network
//! round trip per call and reports the result as an `AttemptOutcome`; it
//! never retries and never returns a Rust error, so the caller only has to
//! branch on the outcome tag.

pub mod scripted;

pub use scripted::ScriptedBackend;

use common::Secret;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Opaque API key authorizing one call to the backend.
///
/// Immutable once loaded. Formatting never reveals the key.
#[derive(Clone)]
pub struct Credential {
    key: Secret<String>,
}

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Secret::new(key.into()),
        }
    }

    /// Raw key for the request header.
    pub fn expose(&self) -> &str {
        self.key.expose()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.key)
    }
}

/// Classification of a failed attempt.
///
/// Both variants advance the failover cursor; the distinction only matters
/// for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// The credential has used up its quota window
    QuotaExceeded,
    /// Network error, timeout, malformed response or any non-quota error status
    Transient,
}

impl ErrorClassification {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClassification::QuotaExceeded => "quota_exceeded",
            ErrorClassification::Transient => "transient",
        }
    }
}

/// Result of a single backend call with a single credential.
///
/// `Success` may carry an empty string; deciding whether that is usable is
/// the dispatcher's job. Failure variants carry a human-readable detail for
/// diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    QuotaExceeded(String),
    TransientFailure(String),
}

impl AttemptOutcome {
    /// Build a failure outcome from a classification.
    pub fn failure(classification: ErrorClassification, detail: impl Into<String>) -> Self {
        match classification {
            ErrorClassification::QuotaExceeded => AttemptOutcome::QuotaExceeded(detail.into()),
            ErrorClassification::Transient => AttemptOutcome::TransientFailure(detail.into()),
        }
    }

    /// Failure classification, or `None` for `Success`.
    pub fn classification(&self) -> Option<ErrorClassification> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::QuotaExceeded(_) => Some(ErrorClassification::QuotaExceeded),
            AttemptOutcome::TransientFailure(_) => Some(ErrorClassification::Transient),
        }
    }
}

/// A text-generation service reachable over the network.
///
/// Uses `Pin<Box<dyn Future>>` return types so it can be held as
/// `Arc<dyn Backend>`.
pub trait Backend: Send + Sync {
    /// Identifier for logging and health reporting (e.g. "gemini")
    fn id(&self) -> &str;

    /// Fixed model identifier sent with every attempt.
    fn model(&self) -> &str;

    /// Send `prompt` to the backend authenticated with `credential`.
    ///
    /// Exactly one round trip. The only suspension point of a dispatch
    /// attempt lives here.
    fn generate<'a>(
        &'a self,
        credential: &'a Credential,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>>;
}
