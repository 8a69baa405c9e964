//! Service configuration: the HTTP listener and the engine behind it.
//!
//! Everything is read once at startup. Values are validated here so the
//! router and the engine never see a malformed origin or address.

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use tenvault_worker::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}='{value}' is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration `tenvault-api` is started with.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    /// Browser origins allowed to call the task and schedule routes.
    pub cors_origins: Vec<HeaderValue>,
    /// Deadline of one HTTP request. Task routes only enqueue, so this
    /// never bounds a running job.
    pub request_timeout: Duration,
    /// Time running tasks get to record their outcome on shutdown.
    pub drain_timeout: Duration,
    /// Worker pool, default storage target, schedule and report settings.
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Defaults for a local listener around `engine`.
    pub fn with_engine(engine: EngineConfig) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
            request_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
            engine,
        }
    }

    /// Load the listener settings from the process environment and the
    /// engine settings through [`EngineConfig::from_env`].
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), EngineConfig::from_env())
    }

    /// Same as [`from_env`](Self::from_env) with variables read through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F, engine: EngineConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = parsed(&lookup, "HOST", "0.0.0.0")?;
        let port: u16 = parsed(&lookup, "PORT", "3000")?;
        let request_timeout: u64 = parsed(&lookup, "REQUEST_TIMEOUT_SECS", "30")?;
        let drain_timeout: u64 = parsed(&lookup, "SHUTDOWN_TIMEOUT_SECS", "30")?;

        let origins = lookup("CORS_ORIGINS").unwrap_or_else(|| "http://localhost:5173".into());
        let cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| {
                HeaderValue::from_str(o).map_err(|e| invalid("CORS_ORIGINS", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if request_timeout == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "0", "must be positive"));
        }

        Ok(Self {
            listen: SocketAddr::new(host, port),
            cors_origins,
            request_timeout: Duration::from_secs(request_timeout),
            drain_timeout: Duration::from_secs(drain_timeout),
            engine,
        })
    }
}

fn invalid(name: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parsed<T, F>(lookup: &F, name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).unwrap_or_else(|| default.to_string());
    value.trim().parse().map_err(|e| invalid(name, &value, e))
}
