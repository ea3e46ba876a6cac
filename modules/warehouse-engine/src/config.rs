//! Typed configuration loaded from the environment, following the
//! teacher's `Config::from_env` env-var-with-default convention.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bus_type: String,
    pub nats_url: String,
    pub host: String,
    pub port: u16,

    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub prefetch_count: usize,
    pub max_retries_consumer: u32,
    pub max_retries_outbox: i32,
    pub agent_timeout_ms: u64,
    pub agent_concurrency: usize,
    pub continue_on_error: bool,
    pub outbox_gc_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let bus_type = env::var("BUS_TYPE").unwrap_or_else(|_| "inmemory".to_string());
        let nats_url =
            env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = parse_env_or("PORT", 8095)?;
        let poll_interval_ms = parse_env_or("POLL_INTERVAL_MS", 1000)?;
        let batch_size = parse_env_or("BATCH_SIZE", 100)?;
        let prefetch_count = parse_env_or("PREFETCH_COUNT", 10)?;
        let max_retries_consumer = parse_env_or("MAX_RETRIES_CONSUMER", 3)?;
        let max_retries_outbox = parse_env_or("MAX_RETRIES_OUTBOX", 5)?;
        let agent_timeout_ms = parse_env_or("AGENT_TIMEOUT_MS", 30_000)?;
        let agent_concurrency = parse_env_or("AGENT_CONCURRENCY", 10)?;
        let continue_on_error = parse_env_or("CONTINUE_ON_ERROR", true)?;
        let outbox_gc_days = parse_env_or("OUTBOX_GC_DAYS", 7)?;

        Ok(Config {
            database_url,
            bus_type,
            nats_url,
            host,
            port,
            poll_interval_ms,
            batch_size,
            prefetch_count,
            max_retries_consumer,
            max_retries_outbox,
            agent_timeout_ms,
            agent_concurrency,
            continue_on_error,
            outbox_gc_days,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| format!("{key} must be a valid value")),
        Err(_) => Ok(default),
    }
}
