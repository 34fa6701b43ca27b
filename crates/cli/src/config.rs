//! Runtime configuration for `logbook`.
//!
//! Values are layered: built-in defaults, then the TOML file given with
//! `--config`, then `LOGBOOK_*` environment variables, then command-line
//! flags (applied by the caller).
//!
//! # Example
//!
//! ```toml
//! log_level = "debug"
//!
//! [server]
//! port = 8080
//! rate_limit = 120
//! api_key = "client-key"
//! admin_api_key = "admin-key"
//! seed = "fixtures/demo.json"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub(crate) const DEFAULT_PORT: u16 = 8080;

/// Default rate limit: 60 requests per minute per IP.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub(crate) log_level: String,
    pub(crate) server: ServerConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
    pub(crate) rate_limit: u64,
    /// Client API key. `None` disables authentication.
    pub(crate) api_key: Option<String>,
    /// Key that grants admin deletes.
    pub(crate) admin_api_key: Option<String>,
    /// JSON seed document loaded at startup.
    pub(crate) seed: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
            admin_api_key: None,
            seed: None,
        }
    }
}

impl Config {
    /// Defaults, overlaid with `path` if given, overlaid with the process
    /// environment.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::read(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub(crate) fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `LOGBOOK_*` overrides read through `lookup`. Empty values are
    /// ignored.
    pub(crate) fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LOGBOOK_PORT") {
            self.server.port = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "LOGBOOK_PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("LOGBOOK_RATE_LIMIT") {
            self.server.rate_limit = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "LOGBOOK_RATE_LIMIT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("LOGBOOK_API_KEY") {
            self.server.api_key = Some(v);
        }
        if let Some(v) = get("LOGBOOK_ADMIN_API_KEY") {
            self.server.admin_api_key = Some(v);
        }
        if let Some(v) = get("LOGBOOK_SEED") {
            self.server.seed = Some(PathBuf::from(v));
        }
        Ok(())
    }
}
