//! Entry point for chat handlers
//!
//! `ChatFacade` owns the process-wide persona and dispatcher. Its methods
//! return a plain `String` under every failure combination, panics included.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::error;

use crate::FALLBACK_MESSAGE;
use crate::dispatch::Dispatcher;
use crate::prompt::compose;

#[derive(Clone)]
pub struct ChatFacade {
    persona: Arc<str>,
    dispatcher: Dispatcher,
}

impl ChatFacade {
    pub fn new(persona: impl Into<Arc<str>>, dispatcher: Dispatcher) -> Self {
        Self {
            persona: persona.into(),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Answer `message`, or `FALLBACK_MESSAGE` if nothing usable came back.
    pub async fn get_response(&self, message: &str) -> String {
        let attempt = async {
            let prompt = compose(&self.persona, message);
            self.dispatcher.dispatch(&prompt).await
        };

        match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(text) => text,
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "dispatch panicked, returning fallback answer");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }

    /// Blocking form of `get_response` for callers outside async code.
    ///
    /// Without a runtime on the current thread a single-threaded one is built
    /// for the call. Inside a multi-threaded runtime the worker is handed off
    /// with `block_in_place`. A current-thread runtime cannot be blocked
    /// safely, so that case answers with the fallback.
    pub fn get_response_blocking(&self, message: &str) -> String {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.get_response(message)))
            }
            Ok(_) => {
                error!("blocking chat call made from a current-thread runtime, returning fallback answer");
                FALLBACK_MESSAGE.to_string()
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(self.get_response(message)),
                Err(e) => {
                    error!(error = %e, "failed to build runtime, returning fallback answer");
                    FALLBACK_MESSAGE.to_string()
                }
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
