//! Sequential failover across the credential pool
//!
//! Attempts never overlap: the next credential is only tried once the
//! previous attempt has returned. Each dispatch starts at index 0.

use std::sync::Arc;

use provider::{AttemptOutcome, Backend};
use tracing::{debug, info, warn};

use crate::FALLBACK_MESSAGE;
use crate::error::{AttemptFailure, Error, FailedAttempt, Result};
use crate::pool::CredentialPool;
use crate::prompt::Prompt;

/// A usable answer and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Pool index of the credential that produced the answer
    pub credential_index: usize,
    /// Attempts made, including the successful one
    pub attempts: usize,
}

/// Walks the pool in order and returns the first non-empty answer.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<CredentialPool>,
    backend: Arc<dyn Backend>,
}

impl Dispatcher {
    pub fn new(pool: Arc<CredentialPool>, backend: Arc<dyn Backend>) -> Self {
        Self { pool, backend }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Try each credential in order until one yields non-empty text.
    ///
    /// Quota exhaustion, transient failures and empty answers are recorded
    /// and the walk moves on. Returns `PoolExhausted` with every failure when
    /// no credential answered, including when the pool is empty.
    pub async fn try_dispatch(&self, prompt: &Prompt) -> Result<Answer> {
        let mut failures = Vec::new();

        for (index, credential) in self.pool.iter() {
            let failure = match self.backend.generate(credential, prompt.as_str()).await {
                AttemptOutcome::Success(text) if !text.is_empty() => {
                    record_attempt("success");
                    record_dispatch("answered");
                    info!(
                        credential_index = index,
                        attempts = failures.len() + 1,
                        backend = self.backend.id(),
                        "dispatch answered"
                    );
                    return Ok(Answer {
                        text,
                        credential_index: index,
                        attempts: failures.len() + 1,
                    });
                }
                AttemptOutcome::Success(_) => AttemptFailure::EmptySuccess,
                AttemptOutcome::QuotaExceeded(detail) => AttemptFailure::QuotaExceeded(detail),
                AttemptOutcome::TransientFailure(detail) => AttemptFailure::Transient(detail),
            };

            record_attempt(failure.label());
            warn!(
                credential_index = index,
                classification = failure.label(),
                reason = %failure,
                "credential failed, trying next"
            );
            failures.push(FailedAttempt {
                credential_index: index,
                failure,
            });
        }

        record_dispatch("exhausted");
        Err(Error::PoolExhausted { failures })
    }

    /// Like `try_dispatch`, but exhaustion becomes `FALLBACK_MESSAGE`.
    pub async fn dispatch(&self, prompt: &Prompt) -> String {
        match self.try_dispatch(prompt).await {
            Ok(answer) => answer.text,
            Err(e) => {
                warn!(error = %e, "returning fallback answer");
                debug!(pool_size = self.pool.len(), "no credential produced an answer");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

fn record_attempt(classification: &'static str) {
    metrics::counter!("failover_attempts_total", "classification" => classification).increment(1);
}

fn record_dispatch(result: &'static str) {
    metrics::counter!("failover_dispatch_total", "result" => result).increment(1);
}
