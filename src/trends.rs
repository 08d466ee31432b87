//! Optional trend-signal provider: a 0–100 interest score for a keyword over
//! a time window. Absent or failing trend data only degrades the momentum
//! sub-score; it never fails a request.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::cache::{CacheCategory, CacheKey};
use crate::error::ProviderError;
use crate::gateway::{CachedPayload, SharedCache};

#[async_trait]
pub trait TrendSource: Send + Sync {
    /// `Ok(None)` when the provider has no data for the keyword.
    async fn interest(&self, keyword: &str, window_days: u32) -> Result<Option<f32>, ProviderError>;
    fn name(&self) -> &'static str;
}

/// Used when no trend endpoint is configured.
pub struct DisabledTrends;

#[async_trait]
impl TrendSource for DisabledTrends {
    async fn interest(&self, _keyword: &str, _window_days: u32) -> Result<Option<f32>, ProviderError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// `GET {base}/interest?keyword=..&days=..` → `{"interest": 0..100}`.
pub struct HttpTrends {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct InterestResp {
    interest: Option<f32>,
}

impl HttpTrends {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent("niche-scout/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl TrendSource for HttpTrends {
    async fn interest(&self, keyword: &str, window_days: u32) -> Result<Option<f32>, ProviderError> {
        let url = format!("{}/interest", self.base_url);
        let days = window_days.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[("keyword", keyword), ("days", days.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        match resp.status().as_u16() {
            429 | 403 => return Err(ProviderError::RateLimited),
            s if !(200..300).contains(&s) => return Err(ProviderError::Http(s)),
            _ => {}
        }

        let body: InterestResp = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(body.interest.map(|v| v.clamp(0.0, 100.0)))
    }

    fn name(&self) -> &'static str {
        "trends-http"
    }
}

/// Cache-first interest lookup. Errors are logged and reported as `None`.
pub async fn cached_interest(
    cache: &SharedCache,
    source: &dyn TrendSource,
    keyword: &str,
    window_days: u32,
) -> Option<f32> {
    let key = CacheKey::new(source.name(), "interest", &format!("{keyword}|{window_days}"));
    if let Some(CachedPayload::Interest(v)) = cache.get(&key) {
        return Some(v);
    }

    match source.interest(keyword, window_days).await {
        Ok(Some(v)) => {
            let v = v.clamp(0.0, 100.0);
            cache.put(key, CachedPayload::Interest(v), CacheCategory::Trend);
            Some(v)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(target: "trends", provider = source.name(), error = %e, "trend lookup failed");
            None
        }
    }
}
