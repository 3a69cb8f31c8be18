use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::app::sync::SyncConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayMode {
    Postgres,
    Memory,
}

impl FromStr for GatewayMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "postgres" => Ok(GatewayMode::Postgres),
            "memory" => Ok(GatewayMode::Memory),
            other => Err(anyhow!("unknown GATEWAY: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub gateway: GatewayMode,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub load_limit: i64,
    pub remote_timeout_ms: u64,
    pub mutation_retry_attempts: u32,
    pub mutation_retry_backoff_ms: u64,
    pub refresh_interval_seconds: u64,
    pub session_hook_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let gateway: GatewayMode = env_or_parse("GATEWAY", "memory")?;

        let database_url = std::env::var("DATABASE_URL").ok();
        if gateway == GatewayMode::Postgres && database_url.is_none() {
            return Err(anyhow!("missing required env var: DATABASE_URL"));
        }

        let load_limit: i64 = env_or_parse("LOAD_LIMIT", "200")?;
        if load_limit < 1 {
            return Err(anyhow!("invalid LOAD_LIMIT: must be at least 1"));
        }

        Ok(Self {
            http_addr,
            gateway,
            database_url,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "5")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            load_limit,
            remote_timeout_ms: env_or_parse("REMOTE_TIMEOUT_MS", "5000")?,
            mutation_retry_attempts: env_or_parse("MUTATION_RETRY_ATTEMPTS", "1")?,
            mutation_retry_backoff_ms: env_or_parse("MUTATION_RETRY_BACKOFF_MS", "250")?,
            refresh_interval_seconds: env_or_parse("REFRESH_INTERVAL_SECONDS", "0")?,
            session_hook_token: std::env::var("SESSION_HOOK_TOKEN").ok(),
        })
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            remote_timeout: Duration::from_millis(self.remote_timeout_ms),
            mutation_retry_attempts: self.mutation_retry_attempts,
            mutation_retry_backoff: Duration::from_millis(self.mutation_retry_backoff_ms),
        }
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0).then(|| Duration::from_secs(self.refresh_interval_seconds))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
