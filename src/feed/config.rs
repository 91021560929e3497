// src/feed/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::decode::FeedFormat;

pub const ENV_CONFIG_PATH: &str = "ALERTS_CONFIG_PATH";
pub const ENV_URL: &str = "TTC_ALERTS_URL";
pub const ENV_FORMAT: &str = "ALERTS_FEED_FORMAT";
pub const ENV_REFRESH_SECS: &str = "ALERTS_REFRESH_SECS";
pub const ENV_TIMEOUT_MS: &str = "ALERTS_FETCH_TIMEOUT_MS";

const DEFAULT_CONFIG_PATH: &str = "config/alerts.toml";
pub const DEFAULT_URL: &str = "https://bustime.ttc.ca/gtfsrt/alerts";

/// Where and how to poll the upstream alert feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub format: FeedFormat,
    pub refresh_interval_secs: u64,
    pub fetch_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            format: FeedFormat::Binary,
            refresh_interval_secs: 60,
            fetch_timeout_ms: 10_000,
            user_agent: concat!("ttc-rt-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Load from an explicit TOML file (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        let cfg: FeedConfig = toml::from_str(&content)
            .with_context(|| format!("parsing feed config {}", path.display()))?;
        cfg.validated()
    }

    /// Resolve configuration:
    /// 1) defaults
    /// 2) $ALERTS_CONFIG_PATH, else config/alerts.toml if it exists
    /// 3) env overrides (TTC_ALERTS_URL, ALERTS_FEED_FORMAT, ...)
    pub fn from_env() -> Result<Self> {
        let base = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_p.exists() {
                    Self::load_from(&default_p)?
                } else {
                    Self::default()
                }
            }
        };
        base.with_env_overrides()?.validated()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(url) = env_nonempty(ENV_URL) {
            self.url = url;
        }
        if let Some(fmt) = env_nonempty(ENV_FORMAT) {
            self.format = fmt.parse().with_context(|| format!("parsing {ENV_FORMAT}"))?;
        }
        if let Some(v) = env_nonempty(ENV_REFRESH_SECS) {
            self.refresh_interval_secs = v
                .parse()
                .with_context(|| format!("parsing {ENV_REFRESH_SECS}={v:?}"))?;
        }
        if let Some(v) = env_nonempty(ENV_TIMEOUT_MS) {
            self.fetch_timeout_ms = v
                .parse()
                .with_context(|| format!("parsing {ENV_TIMEOUT_MS}={v:?}"))?;
        }
        Ok(self)
    }

    fn validated(self) -> Result<Self> {
        if self.url.trim().is_empty() {
            bail!("feed url must not be empty");
        }
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be > 0");
        }
        if self.fetch_timeout_ms == 0 {
            bail!("fetch_timeout_ms must be > 0");
        }
        Ok(self)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
