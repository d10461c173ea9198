/// Service configuration.
///
/// Settings live in a TOML file (default `./aqmon.toml`); every field has a
/// default so a partial file, or none at all, is valid. Provider credentials
/// are normally kept out of the file and supplied through the environment
/// (`OPENAQ_API_KEY`, `WAQI_TOKEN`), with `.env` loaded first via dotenv.

use serde::Deserialize;
use std::path::Path;

use crate::alert::freshness::DEFAULT_MAX_AGE_DAYS;
use crate::ingest::openaq::OPENAQ_BASE_URL;
use crate::ingest::waqi::WAQI_BASE_URL;
use crate::locator::{DEFAULT_RADIUS_KM, DEFAULT_SEARCH_LIMIT};
use crate::logging::LogLevel;
use crate::readings::{DEFAULT_READINGS_LIMIT, DEFAULT_WINDOW_HOURS};

pub const DEFAULT_CONFIG_PATH: &str = "./aqmon.toml";

/// Environment variable holding the OpenAQ API key.
pub const ENV_OPENAQ_API_KEY: &str = "OPENAQ_API_KEY";

/// Environment variable holding the WAQI token.
pub const ENV_WAQI_TOKEN: &str = "WAQI_TOKEN";

/// Default number of candidate stations probed per resolution.
pub const DEFAULT_MAX_STATIONS: usize = 10;

/// Largest accepted freshness window, in days.
pub const MAX_AGE_DAYS_LIMIT: u32 = 365;

/// Largest accepted trailing reading window, in hours (31 days).
pub const MAX_WINDOW_HOURS: u32 = 24 * 31;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAQ_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            base_url: WAQI_BASE_URL.to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

/// Knobs the resolution engine takes as parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    pub default_radius_km: f64,
    pub max_stations_to_query: usize,
    /// Freshness window for primary readings, in days.
    pub max_age_days: u32,
    /// Trailing window for per-sensor "latest" queries, in hours.
    pub window_hours: u32,
    pub readings_limit: u32,
    pub station_search_limit: u32,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            default_radius_km: DEFAULT_RADIUS_KM,
            max_stations_to_query: DEFAULT_MAX_STATIONS,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            window_hours: DEFAULT_WINDOW_HOURS,
            readings_limit: DEFAULT_READINGS_LIMIT,
            station_search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub min_level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            file: None,
            console_timestamps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub primary: PrimaryConfig,
    pub secondary: SecondaryConfig,
    pub resolution: ResolutionSettings,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    /// Parses a TOML document and validates it. No environment lookups.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides credentials from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_OPENAQ_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.primary.api_key = Some(key);
        }
        if let Some(token) = lookup(ENV_WAQI_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.secondary.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.resolution;
        if !r.default_radius_km.is_finite() || r.default_radius_km <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "resolution.default_radius_km must be positive, got {}",
                r.default_radius_km
            )));
        }
        if r.max_stations_to_query == 0 {
            return Err(ConfigError::Invalid(
                "resolution.max_stations_to_query must be at least 1".to_string(),
            ));
        }
        if r.max_age_days == 0 || r.max_age_days > MAX_AGE_DAYS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "resolution.max_age_days must be between 1 and {}, got {}",
                MAX_AGE_DAYS_LIMIT, r.max_age_days
            )));
        }
        if r.window_hours == 0 || r.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "resolution.window_hours must be between 1 and {}, got {}",
                MAX_WINDOW_HOURS, r.window_hours
            )));
        }
        if r.readings_limit == 0 || r.station_search_limit == 0 {
            return Err(ConfigError::Invalid(
                "resolution limits must be at least 1".to_string(),
            ));
        }
        if self.primary.timeout_secs == 0 || self.secondary.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider timeouts must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from `path`, then applies environment overrides.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut config = ServiceConfig::from_toml_str(&contents)?;
    dotenv::dotenv().ok();
    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

/// Like `load_config`, but a missing file yields the defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    let mut config = ServiceConfig::default();
    dotenv::dotenv().ok();
    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
