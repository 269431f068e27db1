//! Google Gemini backend
//!
//! Implements `provider::Backend` over the `generateContent` REST endpoint.
//! Each call is one POST authenticated with a single API key; the response
//! is reduced to an `AttemptOutcome`:
//!
//! 1. 2xx with candidate text → `Success` (text may be empty)
//! 2. 429 or an error body with status `RESOURCE_EXHAUSTED` → `QuotaExceeded`
//! 3. Anything else (connect error, timeout, other status, unparseable or
//!    candidate-less body) → `TransientFailure`

pub mod client;
pub mod constants;
pub mod error;
pub mod quota;
pub mod types;

pub use client::GeminiBackend;
pub use constants::*;
pub use error::{Error, Result};
pub use quota::classify_status;
