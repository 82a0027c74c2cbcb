//! Runtime configuration, sourced entirely from environment variables.

use std::env;

use crate::{Error, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_DB_CONNECTIONS: usize = 16;
const DEFAULT_TRANSFER_WORKER_COUNT: usize = 4;
const DEFAULT_FINALIZER_WORKER_COUNT: usize = 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub max_db_connections: usize,
    pub transfer_worker_count: usize,
    pub finalizer_worker_count: usize,
    pub allowed_origin: Option<String>,
}

impl Config {
    /// Reads configuration from the environment. `DATABASE_URL` is the
    /// only variable without a default — everything else falls back to
    /// a sane value for local development.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL must be set".to_string()))?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let max_db_connections = parse_env_or("MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS)?;
        let transfer_worker_count =
            parse_env_or("TRANSFER_WORKER_COUNT", DEFAULT_TRANSFER_WORKER_COUNT)?;
        let finalizer_worker_count =
            parse_env_or("FINALIZER_WORKER_COUNT", DEFAULT_FINALIZER_WORKER_COUNT)?;

        let allowed_origin = env::var("ALLOWED_ORIGIN")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            database_url,
            bind_addr,
            max_db_connections,
            transfer_worker_count,
            finalizer_worker_count,
            allowed_origin,
        })
    }
}

fn parse_env_or(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| Error::Config(format!("{key} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}
