use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default polling interval, five minutes
pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://wxmon.db";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub interval_seconds: Option<u64>,
    pub station_id: Option<String>,
    pub autostart: Option<bool>,
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("interval_seconds", &self.interval_seconds)
            .field("station_id", &self.station_id)
            .field("autostart", &self.autostart)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: Option<DatabaseConfig>,
    pub monitor: Option<MonitorConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the monitor scheduler needs for one run
#[derive(Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub api_url: String,
    pub api_key: String,
    pub interval_seconds: u64,
    pub station_id: Option<String>,
}

impl MonitorSettings {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            station_id: None,
        }
    }

    pub fn interval_seconds(mut self, interval_seconds: u64) -> Self {
        self.interval_seconds = interval_seconds;
        self
    }

    pub fn station_id(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = Some(station_id.into());
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Missing("monitor.api_url"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("monitor.api_key"));
        }
        if self.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "monitor.interval_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for MonitorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("interval_seconds", &self.interval_seconds)
            .field("station_id", &self.station_id)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from WXMON_CONFIG path (TOML) if present, then
    /// apply WXMON_* environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WXMON_CONFIG").unwrap_or_else(|_| "wxmon.toml".to_string());
        let mut cfg = Self::from_path(&path)?;
        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Read a TOML file, falling back to defaults when it does not exist
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    /// Override file values with whatever `lookup` returns for the
    /// WXMON_* variable names
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WXMON_DATABASE_URL") {
            self.database.get_or_insert_with(Default::default).url = Some(url);
        }

        let monitor = self.monitor.get_or_insert_with(Default::default);
        if let Some(api_url) = lookup("WXMON_API_URL") {
            monitor.api_url = Some(api_url);
        }
        if let Some(api_key) = lookup("WXMON_API_KEY") {
            monitor.api_key = Some(api_key);
        }
        if let Some(station_id) = lookup("WXMON_STATION_ID") {
            monitor.station_id = Some(station_id);
        }
        if let Some(interval) = lookup("WXMON_INTERVAL_SECONDS") {
            let parsed = interval.parse().map_err(|_| ConfigError::Invalid {
                name: "WXMON_INTERVAL_SECONDS",
                reason: format!("not a number: {:?}", interval),
            })?;
            monitor.interval_seconds = Some(parsed);
        }
        Ok(())
    }

    /// Database URL (default sqlite://wxmon.db)
    pub fn database_url(&self) -> String {
        self.database
            .as_ref()
            .and_then(|d| d.url.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }

    /// Start polling as soon as the daemon boots (default false)
    pub fn autostart(&self) -> bool {
        self.monitor
            .as_ref()
            .and_then(|m| m.autostart)
            .unwrap_or(false)
    }

    /// Validated monitor settings; the API url and key have no defaults
    pub fn monitor_settings(&self) -> Result<MonitorSettings, ConfigError> {
        let monitor = self
            .monitor
            .as_ref()
            .ok_or(ConfigError::Missing("monitor"))?;
        let settings = MonitorSettings {
            api_url: monitor
                .api_url
                .clone()
                .ok_or(ConfigError::Missing("monitor.api_url"))?,
            api_key: monitor
                .api_key
                .clone()
                .ok_or(ConfigError::Missing("monitor.api_key"))?,
            interval_seconds: monitor
                .interval_seconds
                .unwrap_or(DEFAULT_INTERVAL_SECONDS),
            station_id: monitor.station_id.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }
}
