use std::env;
use std::str::FromStr;

use crate::errors::{Result, ServiceError};

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| ServiceError::Internal(format!("Invalid {}: {}", name, e)))
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL")
                .map_err(|_| ServiceError::Internal("DATABASE_URL not set".to_string()))?,
            max_connections: parse_var("MAX_CONNECTIONS", "20")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl RedisConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL")
                .map_err(|_| ServiceError::Internal("REDIS_URL not set".to_string()))?,
            key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub run_migrations: bool,
}

impl ServiceConfig {
    pub fn from_env(default_port: u16) -> Result<Self> {
        Ok(Self {
            port: parse_var("SERVER_PORT", &default_port.to_string())?,
            metrics_port: parse_var("METRICS_PORT", "9092")?,
            run_migrations: parse_var("RUN_MIGRATIONS", "true")?,
        })
    }
}

/// Expiry windows shared by every storage tier.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    pub finished_session_ttl_secs: u64,
    pub invite_code_ttl_secs: u64,
    pub queue_marker_ttl_secs: u64,
    pub local_sweep_interval_secs: u64,
}

impl ExpiryConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            finished_session_ttl_secs: parse_var("FINISHED_SESSION_TTL_SECS", "3600")?,
            invite_code_ttl_secs: parse_var("INVITE_CODE_TTL_SECS", "600")?,
            queue_marker_ttl_secs: parse_var("QUEUE_MARKER_TTL_SECS", "300")?,
            local_sweep_interval_secs: parse_var("LOCAL_SWEEP_INTERVAL_SECS", "60")?,
        })
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            finished_session_ttl_secs: 3600,
            invite_code_ttl_secs: 600,
            queue_marker_ttl_secs: 300,
            local_sweep_interval_secs: 60,
        }
    }
}
