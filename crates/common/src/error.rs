//! Startup and configuration errors shared across crates

use thiserror::Error;

/// Errors raised while loading configuration and credentials.
///
/// Nothing on the request path returns this type; it only exists until the
/// service has finished booting.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential loading error: {0}")]
    Credentials(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
