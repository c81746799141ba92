//! Core configuration.
//!
//! # Responsibility
//! - Load runtime configuration from TOML with defaults for every field.
//! - Apply environment overrides used by mobile shells and the CLI.
//!
//! # Invariants
//! - `page_size > 0`.
//! - `search_debounce_ms <= MAX_SEARCH_DEBOUNCE_MS`.

use crate::query::filter::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DB_FILE_NAME: &str = "lexicon.sqlite3";
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
pub const MAX_SEARCH_DEBOUNCE_MS: u64 = 5_000;

const DB_PATH_ENV: &str = "LEXICON_DB_PATH";
const LOG_LEVEL_ENV: &str = "LEXICON_LOG_LEVEL";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config TOML: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// Directory or ZIP shipped with the app.
    pub bundled_source: Option<PathBuf>,
    /// ZIP download location for dictionary updates.
    pub remote_url: Option<String>,
    pub page_size: u32,
    pub search_debounce_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            bundled_source: None,
            remote_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
        }
    }
}

impl CoreConfig {
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overrides `db_path` and `log_level` from `LEXICON_DB_PATH` / `LEXICON_LOG_LEVEL`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = non_blank_env(DB_PATH_ENV) {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = non_blank_env(LOG_LEVEL_ENV) {
            self.log_level = value;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be greater than 0".to_string()));
        }
        if self.search_debounce_ms > MAX_SEARCH_DEBOUNCE_MS {
            return Err(ConfigError::Invalid(format!(
                "search_debounce_ms must be at most {MAX_SEARCH_DEBOUNCE_MS}, got {}",
                self.search_debounce_ms
            )));
        }
        if let Some(url) = self.remote_url.as_deref() {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Invalid(format!(
                    "remote_url must be an http(s) URL, got `{url}`"
                )));
            }
        }
        Ok(())
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
