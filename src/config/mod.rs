//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if a var is malformed. The database
//! URL is only required by commands that talk to Postgres; it is wrapped in
//! `secrecy::SecretString` so credentials stay out of logs.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: Option<SecretString>,
    /// Word list the workers draw candidate values from.
    pub words_path: PathBuf,
    /// Address the HTTP API listens on.
    pub bind_addr: String,
    /// Startup connection attempts before giving up.
    pub connect_attempts: u32,
    /// Pause between startup connection attempts.
    pub connect_backoff: Duration,
    /// Explicit pool size. When unset the pool is sized from the worker count.
    pub db_max_connections: Option<u32>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: lookup("DATABASE_URL").map(SecretString::from),
            words_path: lookup("WORDS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/words.txt")),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            connect_attempts: parse_var(&lookup, "CONNECT_ATTEMPTS", 5)?,
            connect_backoff: Duration::from_secs(parse_var(&lookup, "CONNECT_BACKOFF_SECS", 5)?),
            db_max_connections: parse_optional_var(&lookup, "DB_MAX_CONNECTIONS")?,
            otel_endpoint: lookup("OTEL_ENDPOINT"),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// The database URL, or a config error if `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&SecretString> {
        self.database_url.as_ref().ok_or_else(|| {
            Error::Config("required environment variable DATABASE_URL is not set".to_string())
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional_var(lookup, name)?.unwrap_or(default))
}

/// Like `parse_var`, but an unset variable stays `None`.
fn parse_optional_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid value for {name} ({raw:?}): {e}")))
        })
        .transpose()
}
