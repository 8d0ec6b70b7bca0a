use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::reservation::ReservationSettings;

pub mod cors;

pub use cors::create_cors_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub addr: SocketAddr,
    pub max_connections: u32,
    /// Production runs default to `info` logging instead of `debug`.
    pub production: bool,
    pub cors_allowed_origins: Option<String>,
    pub reservation: ReservationSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let host: IpAddr = parse_or(&lookup, "APP_HOST", || IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "APP_PORT", || DEFAULT_PORT)?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", || DEFAULT_MAX_CONNECTIONS)?;
        let max_code_attempts = parse_or(&lookup, "RESERVATION_MAX_CODE_ATTEMPTS", || {
            DEFAULT_MAX_CODE_ATTEMPTS
        })?;
        let timeout_ms = parse_or(&lookup, "RESERVATION_TIMEOUT_MS", || DEFAULT_TIMEOUT_MS)?;

        let production = lookup("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            addr: SocketAddr::new(host, port),
            max_connections,
            production,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS"),
            reservation: ReservationSettings {
                max_code_attempts,
                operation_timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

fn parse_or<T, F, D>(lookup: &F, key: &'static str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
    D: FnOnce() -> T,
{
    match lookup(key) {
        None => Ok(default()),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
