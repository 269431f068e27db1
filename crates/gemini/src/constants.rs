//! Gemini REST API constants

/// Base URL of the Generative Language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when the config does not name one
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Header carrying the API key. Keeps the key out of the URL and access logs.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// gRPC-style status string Google returns when a key's quota is spent
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";
