use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("cache_hits_total", "Cache lookups served from a live entry");
    describe_counter!("cache_misses_total", "Cache lookups that found nothing or an expired entry");
    describe_counter!("gateway_attempts_total", "Primary instance calls attempted");
    describe_counter!("gateway_failures_total", "Primary instance calls that failed, by kind");
    describe_counter!("gateway_fallback_total", "Secondary provider invocations");
    describe_counter!("gateway_exhausted_total", "Gateway calls where every provider failed");
    describe_counter!("analysis_total", "Completed niche analyses, by grade");
    describe_histogram!("analysis_ms", "End-to-end niche analysis latency in milliseconds");
    describe_histogram!("gateway_call_ms", "Primary instance call latency in milliseconds");
}
