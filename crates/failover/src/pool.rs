//! Ordered, read-only pool of API keys
//!
//! The pool is built once at startup and shared behind an `Arc`. It has no
//! per-credential status: order is the only thing the dispatcher relies on,
//! and it never changes for the life of the process.

use provider::Credential;
use tracing::{info, warn};

/// Ordered set of credentials. May be empty.
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        if credentials.is_empty() {
            warn!("credential pool is empty, every chat request will get the fallback answer");
        } else {
            info!(credentials = credentials.len(), "credential pool initialized");
        }
        Self { credentials }
    }

    /// Build a pool from raw keys, keeping their order.
    ///
    /// Keys are trimmed; blanks are skipped and repeated keys keep only their
    /// first position.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            if seen.iter().any(|k| k == key) {
                warn!(position = seen.len(), "duplicate api key skipped");
                continue;
            }
            seen.push(key.to_string());
        }
        Self::new(seen.into_iter().map(Credential::new).collect())
    }

    /// Split a key list into individual keys.
    ///
    /// Accepts one key per line and/or comma-separated keys. Text after `#`
    /// on a line is a comment.
    pub fn parse_key_list(text: &str) -> Vec<String> {
        text.lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Credentials with their pool index, in pool order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Credential)> {
        self.credentials.iter().enumerate()
    }
}
