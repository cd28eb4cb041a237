use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ::config::{Config, Environment};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Citamed";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of every environment variable read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "CITAMED";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAIL_FROM: &str = "no-reply@citamed.local";
const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;
const DEFAULT_LOCKOUT_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,citamed_lib=debug,tower_http=info"
}

/// Get the application data directory
/// ~/Citamed/ on all platforms, falling back to the working directory
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the SQLite database
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("citamed.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings. Defaults are overridden by `CITAMED_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "bind")]
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub mail_endpoint: Option<String>,
    pub mail_from: String,
    #[serde(rename = "session_ttl_secs", deserialize_with = "secs")]
    pub session_ttl: Duration,
    pub max_login_attempts: u32,
    #[serde(rename = "lockout_secs", deserialize_with = "secs")]
    pub lockout_window: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            db_path: default_db_path(),
            static_dir: None,
            mail_endpoint: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            lockout_window: Duration::from_secs(DEFAULT_LOCKOUT_SECS),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(env_source())
    }

    /// Load settings from an explicit set of `CITAMED_*` variables instead of
    /// the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: ::config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::build(env_source().source(Some(vars)))
    }

    fn build(source: Environment) -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CITAMED_SESSION_TTL_SECS",
                value: "0".into(),
            });
        }
        if self.max_login_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CITAMED_MAX_LOGIN_ATTEMPTS",
                value: "0".into(),
            });
        }
        if self.lockout_window.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CITAMED_LOCKOUT_SECS",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

// CITAMED_BIND -> `bind`, CITAMED_LOCKOUT_SECS -> `lockout_secs`. No nesting.
fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .try_parsing(true)
        .ignore_empty(true)
}

fn secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
