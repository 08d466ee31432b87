// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod monetization;
pub mod scoring;
pub mod trends;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shuttle_axum::axum::Router;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::scoring::{NicheAnalysis, NicheAnalyzer};

use crate::cache::TtlCache;
use crate::classifier::ContentTable;
use crate::gateway::{Gateway, HttpPrimary, InstancePool, ProcessAdapter, YtDlpAdapter};
use crate::monetization::{MonetizationEstimator, MonetizationTable};
use crate::trends::{DisabledTrends, HttpTrends, TrendSource};

/// Wire the cache, gateway, tables and trend source described by `cfg`.
pub fn build_analyzer(cfg: &AppConfig) -> anyhow::Result<NicheAnalyzer> {
    let cache = Arc::new(TtlCache::new(cfg.cache_ttls(), cfg.cache.max_entries));
    let settings = cfg.gateway_settings();

    let pool = InstancePool::new(
        cfg.gateway.instances.clone(),
        Duration::from_secs(cfg.gateway.cooldown_secs),
        cfg.gateway.dead_after_failures,
    );
    let primary = HttpPrimary::new(settings.request_timeout).context("building primary client")?;
    let secondary: Option<Arc<dyn ProcessAdapter>> = if cfg.secondary.enabled {
        Some(Arc::new(YtDlpAdapter::new(
            cfg.secondary.binary.clone(),
            settings.secondary_timeout,
        )))
    } else {
        None
    };
    let gateway = Gateway::new(cache, pool, Arc::new(primary), secondary, settings);

    let trends: Arc<dyn TrendSource> = match &cfg.trends.base_url {
        Some(url) => Arc::new(
            HttpTrends::new(url.clone(), Duration::from_millis(cfg.trends.timeout_ms))
                .context("building trend client")?,
        ),
        None => Arc::new(DisabledTrends),
    };

    let monetization = MonetizationTable::load(cfg.tables.monetization_path.as_deref())?;
    let content = ContentTable::load(cfg.tables.content_types_path.as_deref())?;

    info!(
        instances = cfg.gateway.instances.len(),
        secondary = cfg.secondary.enabled,
        trends = trends.name(),
        categories = monetization.categories.len(),
        "niche analyzer ready"
    );

    Ok(NicheAnalyzer::new(
        Arc::new(gateway),
        Arc::new(MonetizationEstimator::new(monetization)),
        Arc::new(content),
        trends,
        cfg.analyzer_settings(),
    ))
}

/// Full application router (API + `/metrics`) from the default config lookup.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    app_with_config(&cfg)
}

pub fn app_with_config(cfg: &AppConfig) -> anyhow::Result<Router> {
    let analyzer = build_analyzer(cfg)?;
    let metrics = metrics::Metrics::init()?;
    Ok(api::router(AppState::new(analyzer)).merge(metrics.router()))
}
