//! In-memory backend that replays queued outcomes per credential.
//!
//! Used by the failover and service tests to drive the dispatcher through
//! exact quota/transient/empty sequences without a network, and to assert
//! which credentials were tried and in what order.

use crate::{AttemptOutcome, Backend, Credential};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tracing::debug;

enum Step {
    Respond(AttemptOutcome),
    Panic(String),
}

/// Backend whose answers are scripted per API key.
///
/// Each call pops the next step queued for the credential's key. A key with
/// nothing queued answers `TransientFailure`.
pub struct ScriptedBackend {
    model: String,
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            steps: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue `outcome` as the next answer for `key`.
    pub fn push(&self, key: &str, outcome: AttemptOutcome) -> &Self {
        self.enqueue(key, Step::Respond(outcome));
        self
    }

    /// Queue a panic as the next answer for `key`.
    pub fn push_panic(&self, key: &str, message: &str) -> &Self {
        self.enqueue(key, Step::Panic(message.to_string()));
        self
    }

    /// Keys in the order they were called.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn enqueue(&self, key: &str, step: Step) {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.to_string())
            .or_default()
            .push_back(step);
    }

    fn next_step(&self, key: &str) -> Option<Step> {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_mut(key)
            .and_then(VecDeque::pop_front)
    }
}

impl Backend for ScriptedBackend {
    fn id(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(
        &'a self,
        credential: &'a Credential,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
        let key = credential.expose().to_string();
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(key.clone());
        let step = self.next_step(&key);
        Box::pin(async move {
            match step {
                Some(Step::Respond(outcome)) => outcome,
                Some(Step::Panic(message)) => panic!("{message}"),
                None => {
                    debug!("no scripted outcome queued");
                    AttemptOutcome::TransientFailure("no scripted outcome".into())
                }
            }
        })
    }
}
