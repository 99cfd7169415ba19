//! # HTTP Retry Configuration
//!
//! Defaults and overrides for the fetcher's retry loop. A config can be
//! deserialized from JSON or read from the environment, then applied to a
//! `Request` with `Request::with_config`.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{PromqlError, Result};

/// Attempts performed when the caller did not set a retry count.
pub const DEFAULT_RETRIES: u32 = 3;
/// Multiplier applied to the per-attempt timeout after each timeout.
pub const DEFAULT_BACKOFF: f64 = 2.0;

const ENV_TIMEOUT: &str = "PROMQL_HTTP_TIMEOUT_SECS";
const ENV_RETRIES: &str = "PROMQL_HTTP_RETRIES";
const ENV_BACKOFF: &str = "PROMQL_HTTP_BACKOFF";

/// Retry settings for one request.
///
/// Every field is optional so that a partial config only overrides what it
/// names. Unset fields fall back to the request's own values, then to the
/// crate defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Initial per-attempt timeout in seconds. `None` blocks indefinitely.
    pub timeout: Option<f64>,
    /// Number of attempts.
    pub retries: Option<u32>,
    /// Timeout growth factor.
    pub backoff: Option<f64>,
}

impl HttpConfig {
    /// Reads overrides from `PROMQL_HTTP_TIMEOUT_SECS`, `PROMQL_HTTP_RETRIES`
    /// and `PROMQL_HTTP_BACKOFF`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = lookup(ENV_TIMEOUT)
            .map(|raw| parse_var::<f64>(ENV_TIMEOUT, &raw))
            .transpose()?;
        let retries = lookup(ENV_RETRIES)
            .map(|raw| parse_var::<u32>(ENV_RETRIES, &raw))
            .transpose()?;
        let backoff = lookup(ENV_BACKOFF)
            .map(|raw| parse_var::<f64>(ENV_BACKOFF, &raw))
            .transpose()?;

        let config = Self { timeout, retries, backoff };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the retry loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.timeout {
            validate_timeout(t)?;
        }
        if let Some(b) = self.backoff {
            validate_backoff(b)?;
        }
        Ok(())
    }

    /// The timeout as a `Duration`, if one is set.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }
}

pub(crate) fn validate_timeout(secs: f64) -> Result<()> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(PromqlError::InvalidConfig(format!(
            "timeout must be a positive number of seconds, got {}",
            secs
        )));
    }
    Ok(())
}

pub(crate) fn validate_backoff(backoff: f64) -> Result<()> {
    if !backoff.is_finite() || backoff <= 0.0 {
        return Err(PromqlError::InvalidConfig(format!(
            "backoff must be a positive multiplier, got {}",
            backoff
        )));
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| PromqlError::InvalidConfig(format!("{} has an invalid value: {:?}", name, raw)))
}
