//! Shared types for the chat gateway crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
