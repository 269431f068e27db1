//! Multi-credential failover for text generation
//!
//! Sends a persona-prefixed prompt to a `provider::Backend`, walking an
//! ordered pool of API keys until one produces a non-empty answer.
//!
//! Request flow:
//! 1. `ChatFacade::get_response` composes the prompt (`prompt::compose`)
//! 2. `Dispatcher` tries credentials in pool order starting at index 0
//! 3. Quota exhaustion, transient failures and empty answers advance to the
//!    next credential; a non-empty answer stops the walk
//! 4. An exhausted pool yields `FALLBACK_MESSAGE`; the facade also maps
//!    panics to it, so callers always receive a plain string
//!
//! No state survives between dispatches: every request starts again at the
//! first credential, even one that just reported quota exhaustion.

pub mod dispatch;
pub mod error;
pub mod facade;
pub mod pool;
pub mod prompt;

pub use dispatch::{Answer, Dispatcher};
pub use error::{AttemptFailure, Error, FailedAttempt, Result};
pub use facade::ChatFacade;
pub use pool::CredentialPool;
pub use prompt::{DEFAULT_PERSONA, Prompt, compose};

/// Answer returned when no credential produced usable output.
pub const FALLBACK_MESSAGE: &str = "Server is busy, please try again later.";
