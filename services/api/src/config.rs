use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use dataset::config::resolve_database_url;

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind: SocketAddr,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| dataset::config::DEFAULT_DATABASE_URL.to_string());

        let bind = lookup("API_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse()
            .context("API_BIND must be a socket address")?;

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().context("MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().context("DB_MAX_CONNECTIONS must be a number")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: resolve_database_url(&database_url),
            bind,
            static_dir: PathBuf::from(
                lookup("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
            ),
            max_upload_bytes,
            max_connections,
        })
    }
}
