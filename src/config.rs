//! Service configuration
//!
//! Defaults are suitable for local development; every field can be
//! overridden through `IAM_*` environment variables.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::error::{AuthError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            jwt: JwtConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Token signing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Symmetric signing secret; loaded once, constant for the process
    /// lifetime. Rotating it invalidates all previously issued tokens.
    pub secret: String,

    /// Access token lifetime in seconds (short: minutes to ~1 day)
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds (long: days to weeks)
    pub refresh_ttl_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_secs: 24 * 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
        }
    }
}

impl JwtConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

/// Token cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection URL; `None` selects the in-process store
    pub redis_url: Option<String>,

    /// Per-operation timeout; a timed-out cache call is treated as
    /// "cache unavailable", never as a hard failure
    pub op_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            op_timeout_secs: 2,
        }
    }
}

impl CacheConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_secs)
    }
}

impl Config {
    /// Build configuration from defaults plus `IAM_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("IAM_SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse("IAM_SERVER_PORT") {
            config.server.port = port;
        }
        if let Ok(secret) = std::env::var("IAM_JWT_SECRET") {
            config.jwt.secret = secret;
        }
        if let Some(secs) = env_parse("IAM_JWT_ACCESS_TTL_SECS") {
            config.jwt.access_ttl_secs = secs;
        }
        if let Some(secs) = env_parse("IAM_JWT_REFRESH_TTL_SECS") {
            config.jwt.refresh_ttl_secs = secs;
        }
        if let Ok(url) = std::env::var("IAM_REDIS_URL") {
            config.cache.redis_url = Some(url);
        }
        if let Some(secs) = env_parse("IAM_CACHE_TIMEOUT_SECS") {
            config.cache.op_timeout_secs = secs;
        }

        config
    }

    /// Validate the configuration before startup.
    pub fn validate(&self) -> Result<()> {
        if self.jwt.secret.is_empty() {
            return Err(AuthError::InvalidInput(
                "JWT secret is not configured (set IAM_JWT_SECRET)".to_string(),
            ));
        }
        if self.jwt.secret.len() < 32 {
            warn!("JWT secret is shorter than recommended (32 bytes)");
        }
        if self.jwt.access_ttl_secs == 0 || self.jwt.refresh_ttl_secs == 0 {
            return Err(AuthError::InvalidInput(
                "token lifetimes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
