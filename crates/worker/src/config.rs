use std::time::Duration;

use anyhow::Context;

/// Default time allowed for services to stop after a shutdown signal.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Worker process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default  |
    /// |----------------------------|----------|
    /// | `DATABASE_URL`             | required |
    /// | `DATABASE_MAX_CONNECTIONS` | `10`     |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`     |
    /// | `LOG_FORMAT`               | `text`   |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?,
            None => agenda_db::DEFAULT_MAX_CONNECTIONS,
        };

        let shutdown_timeout_secs = match lookup("SHUTDOWN_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("SHUTDOWN_TIMEOUT_SECS must be a valid u64")?,
            None => DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
            log_format,
        })
    }
}
