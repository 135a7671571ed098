//! Server configuration loaded from the environment.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Root directory of the filesystem archive backend.
    pub archive_root: PathBuf,
    /// Location of the persistent TTL dedup cache.
    pub cache_path: PathBuf,
    pub pool_size: usize,
    pub max_pages: u32,
    pub nav_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse().context("PORT must be a number")?,
            Err(_) => 3000,
        };

        let archive_root = std::env::var("ARCHIVE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./archive"));

        let cache_path = std::env::var("CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./seen-cache.json"));

        let pool_size = match std::env::var("POOL_SIZE") {
            Ok(value) => value.parse().context("POOL_SIZE must be a number")?,
            Err(_) => 4,
        };

        let max_pages = match std::env::var("MAX_PAGES") {
            Ok(value) => value.parse().context("MAX_PAGES must be a number")?,
            Err(_) => 10,
        };

        let nav_timeout = match std::env::var("NAV_TIMEOUT_SECS") {
            Ok(value) => {
                Duration::from_secs(value.parse().context("NAV_TIMEOUT_SECS must be a number")?)
            }
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            port,
            archive_root,
            cache_path,
            pool_size,
            max_pages,
            nav_timeout,
        })
    }
}
