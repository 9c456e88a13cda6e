use crate::calendar::{
    Clock, DEFAULT_HORIZON_DAYS, FixedClock, MAX_HORIZON_DAYS, SchoolCalendar,
    SchoolCalendarConfig, SystemClock,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const CONFIG_PATH_ENV: &str = "CART_RESERVATIONS_CONFIG";
pub const HTTP_ADDR_ENV: &str = "CART_RESERVATIONS_HTTP_ADDR";
pub const DATABASE_ENV: &str = "CART_RESERVATIONS_DB";
pub const FIXED_NOW_ENV: &str = "CART_RESERVATIONS_NOW";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidValue { field: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read configuration: {err}"),
            ConfigError::Parse(err) => write!(f, "invalid configuration file: {err}"),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        ConfigError::Parse(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                reason: format!("expected pretty or json, got '{other}'"),
            }),
        }
    }
}

/// Runtime settings shared by both binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http_addr: String,
    /// SQLite file; the in-memory store is used when unset.
    pub database_path: Option<PathBuf>,
    pub horizon_days: u32,
    #[serde(flatten)]
    pub calendar: SchoolCalendarConfig,
    /// Pins the clock, mostly for demos and tests.
    pub fixed_now: Option<NaiveDateTime>,
    pub log_format: LogFormat,
    pub verbose: bool,
    /// Emails allowed to see statistics and everyone's reservations.
    pub admin_emails: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:3000".to_string(),
            database_path: None,
            horizon_days: DEFAULT_HORIZON_DAYS,
            calendar: SchoolCalendarConfig::default(),
            fixed_now: None,
            log_format: LogFormat::default(),
            verbose: false,
            admin_emails: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Read the file named by `CART_RESERVATIONS_CONFIG` (defaults otherwise),
    /// then apply the single-field environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: AppConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = std::env::var(HTTP_ADDR_ENV) {
            self.http_addr = addr;
        }
        if let Some(path) = std::env::var_os(DATABASE_ENV) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(now) = std::env::var(FIXED_NOW_ENV) {
            let parsed = NaiveDateTime::parse_from_str(now.trim(), "%Y-%m-%dT%H:%M:%S")
                .map_err(|err| ConfigError::InvalidValue {
                    field: "fixed_now".to_string(),
                    reason: format!("'{now}': {err}"),
                })?;
            self.fixed_now = Some(parsed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.horizon_days == 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(ConfigError::InvalidValue {
                field: "horizon_days".to_string(),
                reason: format!("must be between 1 and {MAX_HORIZON_DAYS}"),
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "http_addr".to_string(),
                reason: format!("invalid address: {}", self.http_addr),
            })
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.fixed_now {
            Some(now) => Arc::new(FixedClock(now)),
            None => Arc::new(SystemClock),
        }
    }

    pub fn school_calendar(&self) -> SchoolCalendar {
        SchoolCalendar::from_config(&self.calendar)
    }
}
