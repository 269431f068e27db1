//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys come from the GEMINI_API_KEYS env var or api_keys_file and are
//! never read from the TOML itself, so the config file can be committed.

use common::Secret;
use failover::{CredentialPool, DEFAULT_PERSONA};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

/// Env var holding comma-separated API keys.
pub const API_KEYS_ENV: &str = "GEMINI_API_KEYS";

/// Config file used when neither `--config` nor CONFIG_PATH is given.
pub const DEFAULT_CONFIG_PATH: &str = "chat-server.toml";

/// Root configuration. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub contact: ContactConfig,
}

/// HTTP listener and static site settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub index_file: String,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            static_dir: PathBuf::from("."),
            index_file: "Progreso.html".to_string(),
            max_connections: 1000,
        }
    }
}

/// Generation backend settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// File with one API key per line (alternative to GEMINI_API_KEYS)
    pub api_keys_file: Option<PathBuf>,
    /// Resolved keys in pool order
    #[serde(skip)]
    pub api_keys: Vec<Secret<String>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: gemini::DEFAULT_BASE_URL.to_string(),
            model: gemini::DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            api_keys_file: None,
            api_keys: Vec::new(),
        }
    }
}

/// Chat persona settings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// File whose contents replace the built-in persona
    pub persona_file: Option<PathBuf>,
    #[serde(skip)]
    pub persona: Option<String>,
}

impl ChatConfig {
    /// Persona from `persona_file`, or the built-in one.
    pub fn persona(&self) -> &str {
        self.persona.as_deref().unwrap_or(DEFAULT_PERSONA)
    }
}

/// Contact form storage settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub messages_file: PathBuf,
    pub max_messages: usize,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            messages_file: PathBuf::from("data/contact_messages.json"),
            max_messages: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like `load`, but a missing file at the default location means "all
    /// defaults". A missing file anywhere else is still an error.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Self::parse("");
        }
        Self::load(path)
    }

    /// Parse and validate TOML, then resolve API keys and persona.
    ///
    /// API key resolution order:
    /// 1. GEMINI_API_KEYS env var (ignored when blank)
    /// 2. api_keys_file path from config
    pub fn parse(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if !config.backend.base_url.starts_with("http://")
            && !config.backend.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.backend.base_url
            )));
        }

        if config.backend.model.trim().is_empty() {
            return Err(common::Error::Config("model must not be empty".into()));
        }

        if config.backend.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.contact.max_messages == 0 {
            return Err(common::Error::Config(
                "max_messages must be greater than 0".into(),
            ));
        }

        let env_keys = std::env::var(API_KEYS_ENV)
            .ok()
            .map(|v| CredentialPool::parse_key_list(&v))
            .filter(|keys| !keys.is_empty());

        let keys = match env_keys {
            Some(keys) => keys,
            None => match config.backend.api_keys_file {
                Some(ref key_file) => {
                    let text = std::fs::read_to_string(key_file).map_err(|e| {
                        common::Error::Credentials(format!(
                            "failed to read api_keys_file {}: {e}",
                            key_file.display()
                        ))
                    })?;
                    CredentialPool::parse_key_list(&text)
                }
                None => Vec::new(),
            },
        };
        config.backend.api_keys = keys.into_iter().map(Secret::new).collect();

        if let Some(ref persona_file) = config.chat.persona_file {
            let persona = std::fs::read_to_string(persona_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read persona_file {}: {e}",
                    persona_file.display()
                ))
            })?;
            let persona = persona.trim_end().to_owned();
            if !persona.is_empty() {
                config.chat.persona = Some(persona);
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn exposed(config: &Config) -> Vec<&str> {
        config
            .backend
            .api_keys
            .iter()
            .map(|k| k.expose().as_str())
            .collect()
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"
static_dir = "site"

[backend]
model = "gemini-2.5-pro"
timeout_secs = 30

[contact]
messages_file = "/tmp/contacts.json"
max_messages = 50
"#
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.listen_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.server.static_dir, PathBuf::from("site"));
        assert_eq!(config.server.index_file, "Progreso.html");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.backend.base_url, gemini::DEFAULT_BASE_URL);
        assert_eq!(config.backend.model, "gemini-2.5-pro");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.contact.max_messages, 50);
        assert!(config.backend.api_keys.is_empty());
        assert_eq!(config.chat.persona(), DEFAULT_PERSONA);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.listen_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.backend.model, gemini::DEFAULT_MODEL);
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(
            config.contact.messages_file,
            PathBuf::from("data/contact_messages.json")
        );
        assert_eq!(config.contact.max_messages, 1000);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_only_forgives_default_path() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(Config::load_or_default(&missing).is_err());

        // The default path is relative to the working directory, which the
        // test runner sets to the crate root where no such file exists.
        assert!(!Path::new(DEFAULT_CONFIG_PATH).exists());
        let config = Config::load_or_default(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
        assert_eq!(config.server.max_connections, 1000);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = Config::parse("not valid {{{{ toml");
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_api_keys_from_env_keep_order() {
        let _lock = lock_env();
        unsafe { set_env(API_KEYS_ENV, "k-first, k-second,k-third") };
        let config = Config::parse("").unwrap();
        unsafe { remove_env(API_KEYS_ENV) };

        assert_eq!(exposed(&config), vec!["k-first", "k-second", "k-third"]);
    }

    #[test]
    fn test_api_keys_from_file() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("keys");
        std::fs::write(&key_path, "# rotation pool\nk-file-1\n\nk-file-2\n").unwrap();

        let toml_content = format!(
            r#"
[backend]
api_keys_file = "{}"
"#,
            key_path.display()
        );
        let config = Config::parse(&toml_content).unwrap();
        assert_eq!(exposed(&config), vec!["k-file-1", "k-file-2"]);
    }

    #[test]
    fn test_api_keys_env_overrides_file() {
        let _lock = lock_env();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("keys");
        std::fs::write(&key_path, "k-file").unwrap();
        let toml_content = format!(
            r#"
[backend]
api_keys_file = "{}"
"#,
            key_path.display()
        );

        unsafe { set_env(API_KEYS_ENV, "k-env") };
        let config = Config::parse(&toml_content).unwrap();
        unsafe { remove_env(API_KEYS_ENV) };

        assert_eq!(exposed(&config), vec!["k-env"]);
    }

    #[test]
    fn test_blank_env_falls_back_to_file() {
        let _lock = lock_env();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("keys");
        std::fs::write(&key_path, "k-file").unwrap();
        let toml_content = format!(
            r#"
[backend]
api_keys_file = "{}"
"#,
            key_path.display()
        );

        unsafe { set_env(API_KEYS_ENV, "  ,  ") };
        let config = Config::parse(&toml_content).unwrap();
        unsafe { remove_env(API_KEYS_ENV) };

        assert_eq!(exposed(&config), vec!["k-file"]);
    }

    #[test]
    fn test_api_keys_env_overrides_nonexistent_file() {
        let _lock = lock_env();
        let toml_content = r#"
[backend]
api_keys_file = "/nonexistent/path/keys"
"#;
        unsafe { set_env(API_KEYS_ENV, "k-env-wins") };
        let config = Config::parse(toml_content).unwrap();
        unsafe { remove_env(API_KEYS_ENV) };

        assert_eq!(exposed(&config), vec!["k-env-wins"]);
    }

    #[test]
    fn test_api_keys_file_nonexistent_returns_error() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let toml_content = r#"
[backend]
api_keys_file = "/nonexistent/path/keys"
"#;
        let result = Config::parse(toml_content);
        assert!(
            matches!(result, Err(common::Error::Credentials(_))),
            "nonexistent api_keys_file must return a credential error"
        );
    }

    #[test]
    fn test_api_keys_debug_is_redacted() {
        let _lock = lock_env();
        unsafe { set_env(API_KEYS_ENV, "AIza-never-printed") };
        let config = Config::parse("").unwrap();
        unsafe { remove_env(API_KEYS_ENV) };

        let debug = format!("{config:?}");
        assert!(!debug.contains("AIza-never-printed"), "got: {debug}");
    }

    #[test]
    fn test_persona_file_replaces_default() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let persona_path = dir.path().join("persona.txt");
        std::fs::write(&persona_path, "You are a risk manager.\n").unwrap();

        let toml_content = format!(
            r#"
[chat]
persona_file = "{}"
"#,
            persona_path.display()
        );
        let config = Config::parse(&toml_content).unwrap();
        assert_eq!(config.chat.persona(), "You are a risk manager.");
    }

    #[test]
    fn test_missing_persona_file_rejected() {
        let _lock = lock_env();
        unsafe { remove_env(API_KEYS_ENV) };
        let toml_content = r#"
[chat]
persona_file = "/nonexistent/persona.txt"
"#;
        assert!(Config::parse(toml_content).is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let _lock = lock_env();
        let toml_content = r#"
[backend]
base_url = "generativelanguage.googleapis.com"
"#;
        let err = Config::parse(toml_content).unwrap_err().to_string();
        assert!(
            err.contains("base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = lock_env();
        let result = Config::parse("[backend]\ntimeout_secs = 0\n");
        assert!(result.is_err(), "timeout_secs = 0 must be rejected");
    }

    #[test]
    fn test_blank_model_rejected() {
        let _lock = lock_env();
        let result = Config::parse("[backend]\nmodel = \"  \"\n");
        assert!(result.is_err(), "blank model must be rejected");
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let _lock = lock_env();
        let result = Config::parse("[server]\nmax_connections = 0\n");
        assert!(result.is_err(), "max_connections = 0 must be rejected");
    }

    #[test]
    fn test_zero_max_messages_rejected() {
        let _lock = lock_env();
        let result = Config::parse("[contact]\nmax_messages = 0\n");
        assert!(result.is_err(), "max_messages = 0 must be rejected");
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = lock_env();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = lock_env();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = lock_env();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
