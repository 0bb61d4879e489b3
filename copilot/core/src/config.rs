//! TOML Configuration File Support
//!
//! Configuration for the copilot, loaded from an optional TOML file at
//! `~/.config/finance-copilot/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The bearer token is never read from the file. Surfaces take it from
//! `COPILOT_TOKEN` or their own login flow.
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "http://127.0.0.1:8000"
//! user_id = 1
//! scope = "per_user"
//! connect_timeout_ms = 10000
//! read_timeout_ms = 60000
//!
//! [playback]
//! char_delay_ms = 30
//! mode = "live"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::streaming::{EndpointScope, PlaybackConfig, PlaybackMode};

/// Backend address used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config file at {path}: {source}")]
    Io {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        /// The file being parsed
        path: PathBuf,
        /// The TOML error
        source: toml::de::Error,
    },

    /// A value was present but unusable
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Config key
        key: &'static str,
        /// Offending value
        value: String,
        /// What was wrong
        reason: String,
    },
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    #[default]
    Default,
    /// Value from TOML configuration file
    File,
    /// Value from environment variable
    Env,
    /// Value from command-line argument
    Cli,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct ApiToml {
    base_url: Option<String>,
    user_id: Option<u64>,
    scope: Option<String>,
    connect_timeout_ms: Option<u64>,
    /// 0 = no idle timeout
    read_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct PlaybackToml {
    char_delay_ms: Option<u64>,
    mode: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct CopilotToml {
    api: ApiToml,
    playback: PlaybackToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Backend connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    /// User whose data is requested
    pub user_id: u64,
    /// Which stream endpoint to use
    pub scope: EndpointScope,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Longest idle wait between stream blocks (None = unbounded)
    pub read_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: 1,
            scope: EndpointScope::PerUser,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Resolved copilot configuration
#[derive(Clone, Debug, Default)]
pub struct CopilotConfig {
    /// Backend settings
    pub api: ApiConfig,
    /// Insight reveal settings
    pub playback: PlaybackConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl CopilotConfig {
    /// Configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest layer that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/finance-copilot/config.toml` or the platform
/// equivalent.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("finance-copilot").join("config.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<CopilotConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or
/// holds an unusable value.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<CopilotConfig, ConfigError> {
    let mut config = CopilotConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: CopilotToml =
                toml::from_str(&toml_content).map_err(|e| ConfigError::Parse {
                    path: config_path.clone(),
                    source: e,
                })?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_from(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

fn apply_toml_config(config: &mut CopilotConfig, toml: &CopilotToml) -> Result<(), ConfigError> {
    if let Some(ref url) = toml.api.base_url {
        config.api.base_url = parse_base_url("api.base_url", url)?;
    }
    if let Some(user_id) = toml.api.user_id {
        config.api.user_id = user_id;
    }
    if let Some(ref scope) = toml.api.scope {
        config.api.scope = scope.parse().map_err(|reason| ConfigError::InvalidValue {
            key: "api.scope",
            value: scope.clone(),
            reason,
        })?;
    }
    if let Some(ms) = toml.api.connect_timeout_ms {
        config.api.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.api.read_timeout_ms {
        config.api.read_timeout = read_timeout_from_ms(ms);
    }

    if let Some(ms) = toml.playback.char_delay_ms {
        config.playback.char_delay = Duration::from_millis(ms);
    }
    if let Some(ref mode) = toml.playback.mode {
        config.playback.mode = mode.parse().map_err(|reason| ConfigError::InvalidValue {
            key: "playback.mode",
            value: mode.clone(),
            reason,
        })?;
    }

    Ok(())
}

/// Apply environment overrides read through `lookup`
///
/// Unparseable values are logged and skipped, leaving the lower layer in
/// place.
pub fn apply_env_from(config: &mut CopilotConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("COPILOT_API_URL") {
        match parse_base_url("COPILOT_API_URL", &url) {
            Ok(url) => {
                config.api.base_url = url;
                config.source = ConfigSource::Env;
            }
            Err(err) => tracing::warn!(error = %err, "ignoring environment override"),
        }
    }
    if let Some(user) = lookup("COPILOT_USER_ID") {
        if let Some(user_id) = parse_env::<u64>("COPILOT_USER_ID", &user) {
            config.api.user_id = user_id;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(scope) = lookup("COPILOT_SCOPE") {
        if let Some(scope) = parse_env::<EndpointScope>("COPILOT_SCOPE", &scope) {
            config.api.scope = scope;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(timeout) = lookup("COPILOT_READ_TIMEOUT_MS") {
        if let Some(ms) = parse_env::<u64>("COPILOT_READ_TIMEOUT_MS", &timeout) {
            config.api.read_timeout = read_timeout_from_ms(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(delay) = lookup("COPILOT_CHAR_DELAY_MS") {
        if let Some(ms) = parse_env::<u64>("COPILOT_CHAR_DELAY_MS", &delay) {
            config.playback.char_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(mode) = lookup("COPILOT_PLAYBACK_MODE") {
        if let Some(mode) = parse_env::<PlaybackMode>("COPILOT_PLAYBACK_MODE", &mode) {
            config.playback.mode = mode;
            config.source = ConfigSource::Env;
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(key, value, error = %err, "ignoring environment override");
            None
        }
    }
}

fn parse_base_url(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected an http:// or https:// URL".to_string(),
        })
    }
}

fn read_timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,
    /// User id override
    pub user_id: Option<u64>,
    /// Per-character delay override (milliseconds)
    pub char_delay_ms: Option<u64>,
    /// Playback mode override
    pub mode: Option<PlaybackMode>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set user id override
    #[must_use]
    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set per-character delay override
    #[must_use]
    pub fn with_char_delay_ms(mut self, ms: u64) -> Self {
        self.char_delay_ms = Some(ms);
        self
    }

    /// Set playback mode override
    #[must_use]
    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.user_id.is_none()
            && self.char_delay_ms.is_none()
            && self.mode.is_none()
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Fails if the base URL override is not an http(s) URL.
    pub fn apply(&self, config: &mut CopilotConfig) -> Result<(), ConfigError> {
        if let Some(ref url) = self.base_url {
            config.api.base_url = parse_base_url("--api-url", url)?;
        }
        if let Some(user_id) = self.user_id {
            config.api.user_id = user_id;
        }
        if let Some(ms) = self.char_delay_ms {
            config.playback.char_delay = Duration::from_millis(ms);
        }
        if let Some(mode) = self.mode {
            config.playback.mode = mode;
        }

        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
