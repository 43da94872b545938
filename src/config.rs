//! Engine configuration.

use crate::ai::AiStrategy;
use crate::games::othello::Side;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "collective_othello.toml";

/// Configuration for the engine and its SQLite store.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct EngineConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    #[setters(into)]
    database_path: String,

    /// Side the AI plays in new games.
    #[serde(default = "default_ai_side")]
    default_ai_side: Side,

    /// How the AI picks its moves.
    #[serde(default)]
    ai_strategy: AiStrategy,

    /// Page size for listings that specify none.
    #[serde(default = "default_page_size")]
    default_page_size: usize,

    /// Upper bound on any listing page size.
    #[serde(default = "default_max_page_size")]
    max_page_size: usize,

    /// How long a writer waits for the database lock, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    busy_timeout_ms: u64,
}

fn default_database_path() -> String {
    "collective_othello.db".to_string()
}

fn default_ai_side() -> Side {
    Side::White
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_busy_timeout_ms() -> u64 {
    crate::store::DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_ai_side: default_ai_side(),
            ai_strategy: AiStrategy::default(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        if config.max_page_size == 0 {
            return Err(ConfigError::new("max_page_size must be at least 1".to_string()));
        }

        info!(database = %config.database_path, strategy = %config.ai_strategy, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` if given; otherwise the default config file if it
    /// exists, or built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit or existing file is invalid.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
