//! Configuration management for Cadence
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Builder overrides
//! 2. Environment variables (CADENCE_ENGINE__BREAK_ON_ERROR, etc.)
//! 3. Config file (cadence.toml in the working directory, or CADENCE_CONFIG_PATH)
//! 4. Built-in defaults
//!
//! # Example Config File (cadence.toml)
//!
//! ```toml
//! [engine]
//! break_on_error = true
//!
//! [logging]
//! filter = "cadence_core=debug"
//! ansi = false
//! ```
//!
//! # Environment Variables
//!
//! Sections and keys are joined with a double underscore after the CADENCE_ prefix:
//! - CADENCE_ENGINE__BREAK_ON_ERROR
//! - CADENCE_LOGGING__FILTER
//! - CADENCE_LOGGING__ANSI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CADENCE";
const CONFIG_PATH_VAR: &str = "CADENCE_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Interpreter defaults applied to new sequences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether an emitted error breaks out of the current construct
    #[serde(default = "default_break_on_error")]
    pub break_on_error: bool,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

// Default value functions for serde
fn default_break_on_error() -> bool {
    true
}
fn default_filter() -> String {
    "info".to_string()
}
fn default_ansi() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            break_on_error: default_break_on_error(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: default_ansi(),
        }
    }
}

impl Config {
    /// Load configuration with the full priority chain
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Load configuration from a specific file, without environment overlay
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        Ok(config)
    }

    /// Create a builder for constructing config with overrides
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for constructing Config with optional overrides
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    break_on_error: Option<bool>,
    log_filter: Option<String>,
}

impl ConfigBuilder {
    /// Override the config file path
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Override the engine's break-on-error default
    pub fn break_on_error(mut self, flag: Option<bool>) -> Self {
        self.break_on_error = flag;
        self
    }

    /// Override the log filter
    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    /// Build the final config by applying the priority chain
    pub fn build(self) -> Result<Config> {
        // Load .env first so its values show up as environment variables
        let _ = dotenvy::dotenv();

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        self.build_with(environment)
    }

    fn build_with(self, environment: config::Environment) -> Result<Config> {
        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to encode default config")?;
        let mut layers = config::Config::builder().add_source(defaults);

        if let Some(path) = self.locate_file()? {
            layers = layers.add_source(
                config::File::from(path.as_path()).format(config::FileFormat::Toml),
            );
        }

        let mut config: Config = layers
            .add_source(environment)
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to decode configuration")?;

        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Explicit path, then CADENCE_CONFIG_PATH, then ./cadence.toml if present
    fn locate_file(&self) -> Result<Option<PathBuf>> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => match env::var(CONFIG_PATH_VAR) {
                Ok(path_str) => PathBuf::from(path_str),
                Err(_) => {
                    let project_config = PathBuf::from(DEFAULT_CONFIG_FILE);
                    return Ok(project_config.exists().then_some(project_config));
                }
            },
        };

        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        Ok(Some(path))
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(flag) = self.break_on_error {
            config.engine.break_on_error = flag;
        }

        if let Some(filter) = &self.log_filter {
            config.logging.filter = filter.clone();
        }
    }
}
