//! # Upstream Gateway
//! Hides provider topology from callers.
//!
//! Order per call:
//! 1. Cache HIT → return immediately.
//! 2. Primary instances in rotation order, each bounded by a timeout, up to
//!    `max_attempts` distinct instances with a short delay between attempts.
//! 3. Secondary tool (subprocess) once, bounded by its own timeout.
//! 4. `GatewayError::AllProvidersExhausted` with the attempted list.
//!
//! Every success from either provider is cached before it is returned.

pub mod instances;
pub mod primary;
pub mod secondary;

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheCategory, CacheKey, CacheStats, TtlCache};
use crate::error::{GatewayError, ProviderError};
use crate::model::{ChannelRecord, ChannelSummary};

pub use instances::{InstanceHealth, InstancePool, InstanceSnapshot};
pub use primary::{HttpPrimary, PrimaryApi};
pub use secondary::{ProcessAdapter, ToolOutput, ToolRequest, YtDlpAdapter};

/// Values the gateway (and trend lookups) keep in the shared cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Search(Vec<ChannelSummary>),
    Channel(ChannelRecord),
    Interest(f32),
}

pub type SharedCache = Arc<TtlCache<CachedPayload>>;

trait Cacheable: Sized + Clone {
    fn into_payload(self) -> CachedPayload;
    fn from_payload(p: CachedPayload) -> Option<Self>;
}

impl Cacheable for Vec<ChannelSummary> {
    fn into_payload(self) -> CachedPayload {
        CachedPayload::Search(self)
    }
    fn from_payload(p: CachedPayload) -> Option<Self> {
        match p {
            CachedPayload::Search(v) => Some(v),
            _ => None,
        }
    }
}

impl Cacheable for ChannelRecord {
    fn into_payload(self) -> CachedPayload {
        CachedPayload::Channel(self)
    }
    fn from_payload(p: CachedPayload) -> Option<Self> {
        match p {
            CachedPayload::Channel(v) => Some(v),
            _ => None,
        }
    }
}

/// Which provider produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cache,
    Primary,
    Secondary,
}

/// A gateway result plus where it came from.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub source: DataSource,
    /// Instance base URL when `source == Primary`.
    pub instance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub max_attempts: usize,
    pub request_timeout: Duration,
    pub retry_delay: Duration,
    pub secondary_timeout: Duration,
    pub search_limit: usize,
    pub video_limit: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            request_timeout: Duration::from_millis(8000),
            retry_delay: Duration::from_millis(250),
            secondary_timeout: Duration::from_secs(45),
            search_limit: 10,
            video_limit: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SecondaryStatus {
    pub tool: String,
    pub invocations: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

/// Health snapshot served by `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub healthy_instances: usize,
    pub instances: Vec<InstanceSnapshot>,
    pub secondary: Option<SecondaryStatus>,
    pub cache: CacheStats,
}

pub struct Gateway {
    cache: SharedCache,
    pool: InstancePool,
    primary: Arc<dyn PrimaryApi>,
    secondary: Option<Arc<dyn ProcessAdapter>>,
    secondary_stats: Mutex<SecondaryStatus>,
    settings: GatewaySettings,
}

impl Gateway {
    pub fn new(
        cache: SharedCache,
        pool: InstancePool,
        primary: Arc<dyn PrimaryApi>,
        secondary: Option<Arc<dyn ProcessAdapter>>,
        settings: GatewaySettings,
    ) -> Self {
        let secondary_stats = SecondaryStatus {
            tool: secondary
                .as_ref()
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
            ..Default::default()
        };
        Self {
            cache,
            pool,
            primary,
            secondary,
            secondary_stats: Mutex::new(secondary_stats),
            settings,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Channels matching a free-text query.
    pub async fn search_channels(
        &self,
        query: &str,
    ) -> Result<Fetched<Vec<ChannelSummary>>, GatewayError> {
        let limit = self.settings.search_limit;
        let key = CacheKey::new("gateway", "search", &format!("{query}|{limit}"));
        let primary = self.primary.clone();
        let q = query.to_string();
        let request = ToolRequest::Search {
            query: query.to_string(),
            limit,
        };

        self.fetch(
            key,
            CacheCategory::Search,
            move |base| {
                let primary = primary.clone();
                let q = q.clone();
                async move { primary.search_channels(&base, &q, limit).await }
            },
            request,
            move |out| Ok(secondary::normalize_search(out, limit)),
        )
        .await
    }

    /// Channel profile with its recent uploads.
    pub async fn channel(&self, channel_id: &str) -> Result<Fetched<ChannelRecord>, GatewayError> {
        let key = CacheKey::new("gateway", "channel", channel_id);
        let primary = self.primary.clone();
        let id = channel_id.to_string();
        let request = ToolRequest::ChannelVideos {
            channel_id: channel_id.to_string(),
            limit: self.settings.video_limit,
        };

        self.fetch(
            key,
            CacheCategory::Channel,
            move |base| {
                let primary = primary.clone();
                let id = id.clone();
                async move { primary.channel(&base, &id).await }
            },
            request,
            move |out| secondary::normalize_channel(channel_id, out),
        )
        .await
    }

    async fn fetch<T, P, Fut, N>(
        &self,
        key: CacheKey,
        category: CacheCategory,
        primary_call: P,
        tool_request: ToolRequest,
        normalize: N,
    ) -> Result<Fetched<T>, GatewayError>
    where
        T: Cacheable,
        P: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        N: FnOnce(&ToolOutput) -> Result<T, ProviderError>,
    {
        if let Some(value) = self.cache.get(&key).and_then(T::from_payload) {
            return Ok(Fetched {
                value,
                source: DataSource::Cache,
                instance: None,
            });
        }

        let plan = self.pool.plan(self.settings.max_attempts);
        let mut attempted = Vec::with_capacity(plan.len() + 1);
        let mut last_error = ProviderError::Transport("no primary instances configured".into());

        for (attempt, base) in plan.into_iter().enumerate() {
            if attempt > 0 && !self.settings.retry_delay.is_zero() {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
            attempted.push(base.clone());
            counter!("gateway_attempts_total").increment(1);

            let started = Instant::now();
            let result = match tokio::time::timeout(
                self.settings.request_timeout,
                primary_call(base.clone()),
            )
            .await
            {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout(
                    self.settings.request_timeout.as_millis() as u64,
                )),
            };
            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
            histogram!("gateway_call_ms").record(elapsed_ms);

            match result {
                Ok(value) => {
                    self.pool.mark_success(&base);
                    self.cache.put(key.clone(), value.clone().into_payload(), category);
                    info!(target: "gateway", instance = %base, %key, attempt, elapsed_ms, "primary ok");
                    return Ok(Fetched {
                        value,
                        source: DataSource::Primary,
                        instance: Some(base),
                    });
                }
                Err(e) => {
                    self.pool.mark_failure(&base, &e);
                    counter!("gateway_failures_total", "kind" => e.label()).increment(1);
                    warn!(target: "gateway", instance = %base, %key, attempt, error = %e, "primary instance failed");
                    last_error = e;
                }
            }
        }

        if let Some(tool) = &self.secondary {
            counter!("gateway_fallback_total").increment(1);
            attempted.push(tool.name().to_string());
            debug!(target: "gateway", %key, tool = tool.name(), "falling back to secondary provider");

            let result = match tokio::time::timeout(
                self.settings.secondary_timeout,
                tool.invoke(&tool_request),
            )
            .await
            {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout(
                    self.settings.secondary_timeout.as_millis() as u64,
                )),
            }
            .and_then(|out| normalize(&out));

            self.record_secondary(result.as_ref().err());
            match result {
                Ok(value) => {
                    self.cache.put(key.clone(), value.clone().into_payload(), category);
                    info!(target: "gateway", %key, tool = tool.name(), "secondary ok");
                    return Ok(Fetched {
                        value,
                        source: DataSource::Secondary,
                        instance: None,
                    });
                }
                Err(e) => {
                    warn!(target: "gateway", %key, tool = tool.name(), error = %e, "secondary provider failed");
                    last_error = e;
                }
            }
        }

        counter!("gateway_exhausted_total").increment(1);
        Err(GatewayError::AllProvidersExhausted {
            attempted,
            last_error,
        })
    }

    fn record_secondary(&self, err: Option<&ProviderError>) {
        let mut s = match self.secondary_stats.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        s.invocations += 1;
        if let Some(e) = err {
            s.failures += 1;
            s.last_error = Some(e.to_string());
        }
    }

    pub fn status(&self) -> GatewayStatus {
        let instances = self.pool.snapshot();
        let healthy_instances = instances
            .iter()
            .filter(|i| i.health == InstanceHealth::Healthy)
            .count();
        let secondary = self.secondary.as_ref().map(|_| {
            match self.secondary_stats.lock() {
                Ok(g) => g.clone(),
                Err(poison) => poison.into_inner().clone(),
            }
        });
        GatewayStatus {
            healthy_instances,
            instances,
            secondary,
            cache: self.cache.stats(),
        }
    }
}
