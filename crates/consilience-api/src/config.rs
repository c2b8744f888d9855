//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use consilience_core::defaults;
use consilience_core::{Error, Result};
use consilience_synthesis::SynthesisConfig;

/// Where analyses are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!("Invalid storage backend: {other}"))),
        }
    }
}

/// Rate limit for all routes (`governor` direct quota).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u64,
    pub period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: defaults::RATE_LIMIT_REQUESTS,
            period: Duration::from_secs(defaults::RATE_LIMIT_PERIOD_SECS),
        }
    }
}

/// Everything `main` needs to start the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: String,
    pub rate_limit: RateLimitConfig,
    /// Seed the caffeine demo analysis on startup.
    pub seed_demo: bool,
    pub synthesis: SynthesisConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            storage: StorageBackend::default(),
            database_url: defaults::DATABASE_URL.to_string(),
            rate_limit: RateLimitConfig::default(),
            seed_demo: false,
            synthesis: SynthesisConfig::default(),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl ServerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` / `PORT` | `0.0.0.0` / `3000` |
    /// | `STORAGE_BACKEND` | `postgres` |
    /// | `DATABASE_URL` | `postgres://localhost/consilience` |
    /// | `RATE_LIMIT_ENABLED` | `true` |
    /// | `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_PERIOD_SECS` | `100` / `60` |
    /// | `SEED_DEMO` | `false` |
    ///
    /// Synthesis settings, including `SYNTHESIS_REQUEST_DEADLINE_SECS`, come
    /// from `SynthesisConfig::from_env`.
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        let storage = match std::env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => default.storage,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(default.host),
            port: env_parse("PORT").unwrap_or(default.port),
            storage,
            database_url: std::env::var("DATABASE_URL").unwrap_or(default.database_url),
            rate_limit: RateLimitConfig {
                enabled: env_flag("RATE_LIMIT_ENABLED", default.rate_limit.enabled),
                requests: env_parse("RATE_LIMIT_REQUESTS").unwrap_or(default.rate_limit.requests),
                period: env_parse("RATE_LIMIT_PERIOD_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(default.rate_limit.period),
            },
            seed_demo: env_flag("SEED_DEMO", default.seed_demo),
            synthesis: SynthesisConfig::from_env()?,
        })
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    /// Socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address: {e}")))
    }
}
