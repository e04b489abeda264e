//! Server configuration read from the environment.
//!
//! Environment variables:
//!   DATABASE_URL                 - PostgreSQL URL (default: "postgres://localhost/memo")
//!   HOST / PORT                  - bind address (default: 0.0.0.0:8000)
//!   DB_MAX_CONNECTIONS           - pool size (default: 10)
//!   ACCESS_TOKEN_EXPIRE_MINUTES  - bearer token lifetime (default: 30)
//!   ALLOWED_ORIGINS              - comma separated CORS whitelist
//!   RATE_LIMIT_ENABLED           - "true"/"1" to enable (default: true)
//!   RATE_LIMIT_REQUESTS          - requests per period (default: 100)
//!   RATE_LIMIT_PERIOD_SECS       - period in seconds (default: 60)
//!   MAX_BODY_BYTES               - request body limit (default: 1 MiB)

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use governor::{Quota, RateLimiter};
use tracing::warn;

use memo_core::defaults::ACCESS_TOKEN_EXPIRE_MINUTES;
use memo_core::{Error, Result};

use crate::GlobalRateLimiter;

const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub token_lifetime_minutes: i64,
    pub allowed_origins: Vec<HeaderValue>,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_period_secs: u64,
    pub max_body_bytes: usize,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch process state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/memo".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(lookup("PORT"), 8000),
            db_max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), 10),
            token_lifetime_minutes: parse_or(
                lookup("ACCESS_TOKEN_EXPIRE_MINUTES"),
                ACCESS_TOKEN_EXPIRE_MINUTES,
            ),
            allowed_origins: parse_allowed_origins(lookup("ALLOWED_ORIGINS").as_deref()),
            rate_limit_enabled: lookup("RATE_LIMIT_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            rate_limit_requests: parse_or(lookup("RATE_LIMIT_REQUESTS"), 100),
            rate_limit_period_secs: parse_or(lookup("RATE_LIMIT_PERIOD_SECS"), 60),
            max_body_bytes: parse_or(lookup("MAX_BODY_BYTES"), 1024 * 1024),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Global limiter replenishing `rate_limit_requests` per period, or
    /// `None` when disabled.
    pub fn rate_limiter(&self) -> Result<Option<Arc<GlobalRateLimiter>>> {
        if !self.rate_limit_enabled {
            return Ok(None);
        }
        let burst = NonZeroU32::new(self.rate_limit_requests).ok_or_else(|| {
            Error::Config("RATE_LIMIT_REQUESTS must be greater than 0".to_string())
        })?;
        if self.rate_limit_period_secs == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_PERIOD_SECS must be greater than 0".to_string(),
            ));
        }
        let replenish = Duration::from_secs(self.rate_limit_period_secs) / burst.get();
        let quota = Quota::with_period(replenish)
            .ok_or_else(|| Error::Config("Rate limit period is too short".to_string()))?
            .allow_burst(burst);
        Ok(Some(Arc::new(RateLimiter::direct(quota))))
    }
}

/// Parse a comma separated origin list. Blank input falls back to the
/// local development origins.
pub fn parse_allowed_origins(raw: Option<&str>) -> Vec<HeaderValue> {
    let raw = raw.unwrap_or("");
    if raw.trim().is_empty() {
        return DEFAULT_ALLOWED_ORIGINS
            .iter()
            .copied()
            .map(HeaderValue::from_static)
            .collect();
    }

    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
