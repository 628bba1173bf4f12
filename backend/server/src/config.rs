use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use bank::SystemClock;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::{redis::DEFAULT_HASH_KEY, rest::DEFAULT_TABLE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Secret {0} not found in /run/secrets or the environment")]
    MissingSecret(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
    Rest,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            "rest" => Ok(StoreBackend::Rest),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub redis_url: String,
    pub redis_hash_key: String,
    pub rest_url: String,
    pub rest_table: String,
    pub rest_api_key: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    /// Pins the calendar month to a fixed offset instead of host local time.
    pub utc_offset_minutes: Option<i32>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let store: StoreBackend = try_load("STORE_BACKEND", "memory")?;

        let rest_api_key = match store {
            StoreBackend::Rest => Some(read_secret("REST_API_KEY")?),
            _ => None,
        };

        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            store,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            redis_hash_key: try_load("REDIS_HASH_KEY", DEFAULT_HASH_KEY)?,
            rest_url: try_load("REST_URL", "http://127.0.0.1:54321")?,
            rest_table: try_load("REST_TABLE", DEFAULT_TABLE)?,
            rest_api_key,
            jwt_secret: read_secret("JWT_SECRET")?,
            jwt_audience: try_load_optional("JWT_AUDIENCE")?,
            utc_offset_minutes: try_load_optional("CALENDAR_UTC_OFFSET_MINUTES")?,
        })
    }
}

impl Config {
    /// In-memory store on the default port, everything else left at its default.
    pub fn development(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: 1111,
            store: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_hash_key: DEFAULT_HASH_KEY.to_string(),
            rest_url: "http://127.0.0.1:54321".to_string(),
            rest_table: DEFAULT_TABLE.to_string(),
            rest_api_key: None,
            jwt_secret: jwt_secret.into(),
            jwt_audience: None,
            utc_offset_minutes: None,
        }
    }

    pub fn clock(&self) -> Result<SystemClock, ConfigError> {
        match self.utc_offset_minutes {
            None => Ok(SystemClock::local()),
            Some(minutes) => SystemClock::with_offset_minutes(minutes).ok_or_else(|| {
                ConfigError::Invalid {
                    key: "CALENDAR_UTC_OFFSET_MINUTES".to_string(),
                    reason: format!("{minutes} is not a valid UTC offset"),
                }
            }),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &raw)
}

fn try_load_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse(key, raw.trim()).map(Some),
        _ => Ok(None),
    }
}

/// Docker secret first, then an environment variable of the same name.
fn read_secret(secret_name: &str) -> Result<String, ConfigError> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .or_else(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
            env::var(secret_name).map(|s| s.trim().to_string())
        })
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingSecret(secret_name.to_string()))
}
