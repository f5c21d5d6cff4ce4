//! Process configuration.
//!
//! Read once at startup from the environment, after loading `.env` if one
//! exists. Values already set in the process environment win over `.env`.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path of the OpenAPI / Swagger document.
    pub spec_path: String,
    /// Where Swagger UI is mounted.
    pub docs_path: String,
    /// CORS allow-list. `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
    /// When set, startup waits until `db_host:db_port` accepts connections.
    pub db_host: Option<String>,
    pub db_port: u16,
    pub ready_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 10010,
            spec_path: "api/swagger/swagger.yaml".to_owned(),
            docs_path: "/docs".to_owned(),
            cors_origins: vec!["*".to_owned()],
            log_level: "info".to_owned(),
            log_format: LogFormat::Text,
            db_host: None,
            db_port: 5432,
            ready_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(path) = get("SPEC_PATH") {
            config.spec_path = path;
        }
        if let Some(path) = get("DOCS_PATH") {
            config.docs_path = path;
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            config.log_format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }
        config.db_host = get("DB_HOST");
        if let Some(port) = get("DB_PORT") {
            config.db_port = parse("DB_PORT", &port)?;
        }
        if let Some(secs) = get("READY_TIMEOUT_SECS") {
            config.ready_timeout = Duration::from_secs(parse("READY_TIMEOUT_SECS", &secs)?);
        }

        Ok(config)
    }

    /// The socket address to listen on.
    pub fn addr(&self) -> Result<SocketAddr, Error> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|e| Error::Config(format!("invalid listen address `{raw}`: {e}")))
    }

    /// `host:port` of the database, when one is configured.
    pub fn db_addr(&self) -> Option<String> {
        self.db_host.as_ref().map(|host| format!("{host}:{}", self.db_port))
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| Error::Config(format!("{key}={raw:?} is not valid: {e}")))
}
