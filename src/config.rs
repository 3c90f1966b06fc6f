//! Run configuration.
//!
//! [`DownloadConfig`] is the one value a download run is built from. It is
//! assembled in the binary from CLI flags layered over an optional
//! [`Settings`] file.
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/68.0.3440.106 Safari/537.36";

/// Environment variable pointing at an alternative settings file.
pub const CONFIG_ENV: &str = "PIECEFETCH_CONFIG";

/// Everything one download run needs.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub url: String,
    pub user_agent: String,
    /// Requested number of workers. Lowered to 1 when the server cannot serve
    /// ranges or does not report a size.
    pub concurrency: usize,
    /// Explicit piece size, `None` to derive it from size and concurrency.
    pub piece_size: Option<u64>,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    pub connect_timeout: Option<Duration>,
    /// Output path, `None` to name the file after the URL.
    pub output: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl DownloadConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: default_concurrency(),
            piece_size: None,
            accept_invalid_certs: true,
            connect_timeout: None,
            output: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Number of available processors, at least 1.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Optional user defaults read from a JSON file. Every field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub concurrency: Option<usize>,
    pub user_agent: Option<String>,
    pub piece_size: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub verify_tls: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    /// Loads the settings file. A missing file yields the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// `$PIECEFETCH_CONFIG`, else `<config dir>/piecefetch/config.json`.
    pub fn path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("piecefetch").join("config.json"))
    }
}
