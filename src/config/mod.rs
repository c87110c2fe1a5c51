//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on malformed values.
//! Database URLs are wrapped in secrecy::SecretString to prevent log leaks.

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BEANSTALKD_ADDR: &str = "127.0.0.1:11300";
pub const DEFAULT_MEMORY_LIMIT: i64 = 100_000_000;
pub const DEFAULT_SLEEP_US: u64 = 100_000;
pub const DEFAULT_LOG_DIR: &str = "log";

#[derive(Debug)]
pub struct Config {
    pub beanstalkd_addr: String,
    /// Memory ceiling in bytes. Zero or negative disables the check.
    pub memory_limit: i64,
    /// Pause between loop iterations, in microseconds.
    pub sleep_us: u64,
    pub log_dir: PathBuf,
    /// Directory of TOML worker definitions, if any.
    pub worker_defs_dir: Option<PathBuf>,
    /// Tube the built-in `echo` worker reserves from.
    pub worker_tube: String,
    /// `DATABASE_URL` (the default connection).
    pub database_url: Option<SecretString>,
    /// `DATABASE_URL_<CONNECTION>` overrides, keyed by lowercase connection name.
    pub connection_urls: HashMap<String, SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

/// Loop tuning handed to each worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub memory_limit: i64,
    pub sleep_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            sleep_interval: Duration::from_micros(DEFAULT_SLEEP_US),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let var = |name: &str| vars.get(name).cloned();

        let connection_urls = vars
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix("DATABASE_URL_")?;
                Some((name.to_lowercase(), SecretString::from(value.clone())))
            })
            .collect();

        Ok(Self {
            beanstalkd_addr: var("BEANSTALKD_ADDR")
                .unwrap_or_else(|| DEFAULT_BEANSTALKD_ADDR.to_string()),
            memory_limit: parse_var(&vars, "WORKER_MEMORY_LIMIT", DEFAULT_MEMORY_LIMIT)?,
            sleep_us: parse_var(&vars, "WORKER_SLEEP_US", DEFAULT_SLEEP_US)?,
            log_dir: var("WORKER_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            worker_defs_dir: var("WORKER_DEFS_DIR").map(PathBuf::from),
            worker_tube: var("WORKER_TUBE").unwrap_or_else(|| "default".to_string()),
            database_url: var("DATABASE_URL").map(SecretString::from),
            connection_urls,
            otel_endpoint: var("OTEL_ENDPOINT"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Register a database URL for a named connection.
    pub fn set_connection_url(&mut self, connection: &str, url: impl Into<String>) {
        self.connection_urls.insert(
            connection.to_lowercase(),
            SecretString::from(url.into()),
        );
    }

    /// Database URL for a connection name, falling back to `DATABASE_URL`.
    pub fn database_url_for(&self, connection: &str) -> Option<&SecretString> {
        self.connection_urls
            .get(&connection.to_lowercase())
            .or(self.database_url.as_ref())
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            memory_limit: self.memory_limit,
            sleep_interval: Duration::from_micros(self.sleep_us),
        }
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?} is not valid: {e}"))),
    }
}
