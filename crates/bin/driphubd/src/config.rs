//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `driphub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use driphub_app::engine::EngineConfig;
use driphub_app::history::EventHistoryTracker;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Engine timing and retention settings.
    pub engine: EngineSection,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Engine timing and retention settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Dispatcher poll interval in milliseconds.
    pub dispatch_interval_ms: u64,
    /// Reaper interval in seconds.
    pub reaper_interval_secs: u64,
    /// Maximum execution lifetime in hours.
    pub max_execution_hours: u64,
    /// Upper bound on a single webhook call, in seconds.
    pub webhook_timeout_secs: u64,
    /// Per-user event history ring size.
    pub history_max_events: usize,
    /// Event history retention in days.
    pub history_max_age_days: i64,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual/demo traffic integration.
    pub virtual_enabled: bool,
    /// Seconds between virtual traffic events.
    pub virtual_interval_secs: u64,
}

impl Config {
    /// Load configuration from `driphub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("driphub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRIPHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("DRIPHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("DRIPHUB_VIRTUAL") {
            self.integrations.virtual_enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.dispatch_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "dispatch_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.engine.max_execution_hours == 0 {
            return Err(ConfigError::Validation(
                "max_execution_hours must be non-zero".to_string(),
            ));
        }
        if self.engine.history_max_events == 0 {
            return Err(ConfigError::Validation(
                "history_max_events must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine configuration derived from the `[engine]` section.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            dispatch_interval: Duration::from_millis(self.engine.dispatch_interval_ms),
            reaper_interval: Duration::from_secs(self.engine.reaper_interval_secs),
            max_execution_lifetime: Duration::from_secs(self.engine.max_execution_hours * 3600),
            webhook_timeout: Duration::from_secs(self.engine.webhook_timeout_secs),
        }
    }

    /// Event history tracker configured from the `[engine]` section.
    #[must_use]
    pub fn history_tracker(&self) -> EventHistoryTracker {
        EventHistoryTracker::new(
            self.engine.history_max_events,
            chrono::Duration::days(self.engine.history_max_age_days),
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:driphub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "driphubd=info,driphub=info".to_string(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 250,
            reaper_interval_secs: 3600,
            max_execution_hours: 24,
            webhook_timeout_secs: 10,
            history_max_events: 100,
            history_max_age_days: 90,
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            virtual_interval_secs: 5,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
