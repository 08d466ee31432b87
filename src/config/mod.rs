// src/config/mod.rs
//! Service configuration.
//!
//! Lookup order:
//! 1) $NICHE_CONFIG_PATH (must exist)
//! 2) config/niche.toml
//! 3) built-in defaults
//!
//! Env overrides applied on top: `NICHE_INSTANCES` (comma-separated URLs),
//! `NICHE_SECONDARY_BIN`, `NICHE_TRENDS_URL`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::cache::CacheTtls;
use crate::gateway::GatewaySettings;
use crate::scoring::AnalyzerSettings;

pub const ENV_PATH: &str = "NICHE_CONFIG_PATH";
pub const ENV_INSTANCES: &str = "NICHE_INSTANCES";
pub const ENV_SECONDARY_BIN: &str = "NICHE_SECONDARY_BIN";
pub const ENV_TRENDS_URL: &str = "NICHE_TRENDS_URL";

const DEFAULT_PATH: &str = "config/niche.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub gateway: GatewayConfig,
    pub secondary: SecondaryConfig,
    pub trends: TrendsConfig,
    pub tables: TablesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub search_ttl_secs: u64,
    pub channel_ttl_secs: u64,
    pub trend_ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: 900,
            channel_ttl_secs: 21_600,
            trend_ttl_secs: 3_600,
            max_entries: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub instances: Vec<String>,
    pub request_timeout_ms: u64,
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
    pub cooldown_secs: u64,
    pub dead_after_failures: u32,
    pub search_limit: usize,
    pub channel_sample: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            instances: vec![
                "https://inv.nadeko.net".into(),
                "https://yewtu.be".into(),
                "https://invidious.nerdvpn.de".into(),
                "https://iv.ggtyler.dev".into(),
            ],
            request_timeout_ms: 8_000,
            max_attempts: 4,
            retry_delay_ms: 250,
            cooldown_secs: 120,
            dead_after_failures: 3,
            search_limit: 10,
            channel_sample: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    pub enabled: bool,
    pub binary: String,
    pub timeout_secs: u64,
    pub video_limit: usize,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: "yt-dlp".into(),
            timeout_secs: 45,
            video_limit: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    /// No trend provider when unset.
    pub base_url: Option<String>,
    pub window_days: u32,
    pub timeout_ms: u64,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            window_days: 90,
            timeout_ms: 5_000,
        }
    }
}

/// Override paths for the data tables; the embedded copies are used otherwise.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub monetization_path: Option<PathBuf>,
    pub content_types_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing service config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file (env path, then `config/niche.toml`, then
    /// defaults) and apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(list) = env::var(ENV_INSTANCES) {
            let urls: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !urls.is_empty() {
                self.gateway.instances = urls;
            }
        }
        if let Ok(bin) = env::var(ENV_SECONDARY_BIN) {
            if !bin.trim().is_empty() {
                self.secondary.binary = bin.trim().to_string();
            }
        }
        if let Ok(url) = env::var(ENV_TRENDS_URL) {
            let url = url.trim();
            self.trends.base_url = (!url.is_empty()).then(|| url.to_string());
        }
    }

    fn validate(&self) -> Result<()> {
        if self.gateway.max_attempts == 0 {
            bail!("gateway.max_attempts must be at least 1");
        }
        if self.gateway.dead_after_failures == 0 {
            bail!("gateway.dead_after_failures must be at least 1");
        }
        if self.gateway.request_timeout_ms == 0 || self.secondary.timeout_secs == 0 {
            bail!("timeouts must be non-zero");
        }
        if self.cache.max_entries == 0 {
            bail!("cache.max_entries must be at least 1");
        }
        Ok(())
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            search: Duration::from_secs(self.cache.search_ttl_secs),
            channel: Duration::from_secs(self.cache.channel_ttl_secs),
            trend: Duration::from_secs(self.cache.trend_ttl_secs),
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            max_attempts: self.gateway.max_attempts,
            request_timeout: Duration::from_millis(self.gateway.request_timeout_ms),
            retry_delay: Duration::from_millis(self.gateway.retry_delay_ms),
            secondary_timeout: Duration::from_secs(self.secondary.timeout_secs),
            search_limit: self.gateway.search_limit,
            video_limit: self.secondary.video_limit,
        }
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            channel_sample: self.gateway.channel_sample,
            trend_window_days: self.trends.window_days,
            ..AnalyzerSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
[gateway]
max_attempts = 2

[cache]
search_ttl_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(cfg.gateway.max_attempts, 2);
        assert_eq!(cfg.gateway.instances.len(), 4);
        assert_eq!(cfg.cache_ttls().search, Duration::from_secs(60));
        assert_eq!(cfg.cache_ttls().channel, Duration::from_secs(21_600));
        assert!(cfg.secondary.enabled);
        assert!(cfg.trends.base_url.is_none());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(AppConfig::from_toml_str("[gateway]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(AppConfig::from_toml_str("[gateway\n").is_err());
    }
}
