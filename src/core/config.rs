//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.tuidoist/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

use crate::core::query::LogicalFilter;
use crate::remote::{ClientOptions, DEFAULT_BASE_URL};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TuidoistConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dates: DatesConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    pub token: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DatesConfig {
    pub timezone: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Path prefixes of API generations the service has shut down.
const RETIRED_API_PATHS: [&str; 4] = ["/rest/v1", "/rest/v2", "/sync/v8", "/sync/v9"];

// ============================================================================
// Timezone
// ============================================================================

/// Where "today" comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimezoneSetting {
    #[default]
    Local,
    /// Ask the remote account for its offset at startup.
    Service,
    Offset(FixedOffset),
}

impl FromStr for TimezoneSetting {
    type Err = ConfigError;

    /// Accepts `local`, `service`/`account`, `utc`/`z`, or an offset such as
    /// `+05:30` or `-0300`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(TimezoneSetting::Local),
            "service" | "account" => Ok(TimezoneSetting::Service),
            "utc" | "z" => Ok(TimezoneSetting::Offset(Utc.fix())),
            _ => value
                .parse::<FixedOffset>()
                .map(TimezoneSetting::Offset)
                .map_err(|_| ConfigError::InvalidTimezone(value.to_string())),
        }
    }
}

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub token: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub cache_ttl: Duration,
    pub default_filter: LogicalFilter,
    pub timezone: TimezoneSetting,
}

impl ResolvedConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no API token: set TODOIST_API_TOKEN or [api].token in {path}", path = display_path())]
    MissingToken,
    #[error("base URL {0} points at a retired API version; use {current}", current = DEFAULT_BASE_URL)]
    DeprecatedEndpoint(String),
    #[error("invalid base URL '{0}': {1}")]
    InvalidBaseUrl(String, String),
    #[error("invalid timezone '{0}': expected local, service or an offset like +05:30")]
    InvalidTimezone(String),
    #[error("invalid default filter: {0}")]
    InvalidFilter(String),
}

fn display_path() -> String {
    config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.tuidoist/config.toml".to_string())
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.tuidoist/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tuidoist").join("config.toml"))
}

/// Load config from `~/.tuidoist/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `TuidoistConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<TuidoistConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(TuidoistConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<TuidoistConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(TuidoistConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: TuidoistConfig = toml::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    // The token never goes to the log.
    debug!(
        "Config: general={:?} cache={:?} dates={:?} base_url={:?}",
        config.general, config.cache, config.dates, config.api.base_url
    );
    Ok(config)
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tuidoist Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_filter = "today"          # "today", "this_week", "overdue", "all", "history" or a saved filter name

# [api]
# token = "0123abcd..."             # Or set TODOIST_API_TOKEN env var
# base_url = "https://api.todoist.com/api/v1"   # Or TODOIST_BASE_URL
# timeout_secs = 10
# max_retries = 2
# retry_backoff_ms = 250

# [cache]
# ttl_secs = 300                    # Projects, labels and saved filters

# [dates]
# timezone = "local"                # "local", "service" or a fixed offset like "+05:30"
"#;

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG_TEMPLATE) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Values taken from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub token: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            token: non_empty("TODOIST_API_TOKEN"),
            base_url: non_empty("TODOIST_BASE_URL"),
        }
    }
}

/// Values taken from command-line flags.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub filter: Option<String>,
    pub timezone: Option<String>,
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(
    config: &TuidoistConfig,
    env: &EnvOverrides,
    cli: &CliOverrides,
) -> Result<ResolvedConfig, ConfigError> {
    // Token: env → config. Required.
    let token = env
        .token
        .clone()
        .or_else(|| config.api.token.clone())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingToken)?;

    // Base URL: env → config → default
    let base_url = env
        .base_url
        .clone()
        .or_else(|| config.api.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    check_base_url(&base_url)?;

    // Filter: CLI → config → today
    let default_filter = match cli.filter.as_deref().or(config.general.default_filter.as_deref()) {
        Some(raw) => raw.parse().map_err(ConfigError::InvalidFilter)?,
        None => LogicalFilter::Today,
    };

    // Timezone: CLI → config → local
    let timezone = match cli.timezone.as_deref().or(config.dates.timezone.as_deref()) {
        Some(raw) => raw.parse()?,
        None => TimezoneSetting::Local,
    };

    Ok(ResolvedConfig {
        token,
        base_url,
        timeout: Duration::from_secs(config.api.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        max_retries: config.api.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        retry_backoff: Duration::from_millis(
            config.api.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
        ),
        cache_ttl: Duration::from_secs(config.cache.ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
        default_filter,
        timezone,
    })
}

fn check_base_url(base_url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl(base_url.to_string(), reason);
    let url = reqwest::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    let trimmed = base_url.trim_end_matches('/');
    if RETIRED_API_PATHS.iter().any(|p| trimmed.contains(p)) {
        return Err(ConfigError::DeprecatedEndpoint(base_url.to_string()));
    }
    Ok(())
}

impl fmt::Display for TimezoneSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimezoneSetting::Local => write!(f, "local"),
            TimezoneSetting::Service => write!(f, "service"),
            TimezoneSetting::Offset(offset) => write!(f, "{offset}"),
        }
    }
}
