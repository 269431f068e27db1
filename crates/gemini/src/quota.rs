//! Quota detection for Gemini error responses
//!
//! A key whose quota window is spent answers 429 with an error body whose
//! `status` is `RESOURCE_EXHAUSTED`. Proxies in front of the API sometimes
//! rewrite the HTTP status, so the body status is checked on every error
//! response, not only on 429.

use provider::ErrorClassification;
use serde::Deserialize;

use crate::constants::RESOURCE_EXHAUSTED;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
}

/// Whether an error body reports resource exhaustion.
///
/// Parses the Google error envelope first; falls back to a case-insensitive
/// substring match for bodies that are not valid JSON.
fn is_resource_exhausted(body: &str) -> bool {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.status.eq_ignore_ascii_case(RESOURCE_EXHAUSTED),
        Err(_) => body.to_ascii_uppercase().contains(RESOURCE_EXHAUSTED),
    }
}

/// Classify a non-success backend response by HTTP status and body.
///
/// 429 is always quota exhaustion. Any other status is quota exhaustion only
/// when the body says `RESOURCE_EXHAUSTED`; everything else is transient.
pub fn classify_status(status: u16, body: &str) -> ErrorClassification {
    if status == 429 || is_resource_exhausted(body) {
        ErrorClassification::QuotaExceeded
    } else {
        ErrorClassification::Transient
    }
}
