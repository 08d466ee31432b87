//! Primary structured-data provider: one HTTP API served by many
//! interchangeable instances. The gateway picks the base URL; this module only
//! knows how to talk to a single instance and normalize its JSON.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::model::{channel_url, clean_text, ChannelRecord, ChannelSummary, VideoRecord};

/// Calls against one primary-provider instance.
#[async_trait]
pub trait PrimaryApi: Send + Sync {
    async fn search_channels(
        &self,
        base_url: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChannelSummary>, ProviderError>;

    async fn channel(&self, base_url: &str, channel_id: &str)
        -> Result<ChannelRecord, ProviderError>;

    fn name(&self) -> &'static str;
}

/// reqwest-backed client for the instance JSON API (`/api/v1/...`).
pub struct HttpPrimary {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpPrimary {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent("niche-scout/0.1")
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, ProviderError> {
        let resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout.as_millis() as u64)
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.as_u16() == 429 || status.as_u16() == 403 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout.as_millis() as u64)
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;
        serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl PrimaryApi for HttpPrimary {
    async fn search_channels(
        &self,
        base_url: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChannelSummary>, ProviderError> {
        let url = format!(
            "{base_url}/api/v1/search?type=channel&q={}",
            encode_query(query)
        );
        let items: Vec<SearchItem> = self.get_json(&url).await?;
        Ok(normalize_search(items, limit))
    }

    async fn channel(
        &self,
        base_url: &str,
        channel_id: &str,
    ) -> Result<ChannelRecord, ProviderError> {
        let url = format!("{base_url}/api/v1/channels/{}", encode_query(channel_id));
        let raw: RawChannel = self.get_json(&url).await?;
        normalize_channel(raw)
    }

    fn name(&self) -> &'static str {
        "instance-api"
    }
}

/* ----------------------------
Wire shapes (provider-specific)
---------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_id: String,
    pub sub_count: Option<u64>,
    pub video_count: Option<u64>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChannel {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub description: String,
    pub sub_count: Option<u64>,
    pub total_views: Option<u64>,
    pub video_count: Option<u64>,
    #[serde(default)]
    pub latest_videos: Vec<RawVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVideo {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub length_seconds: Option<u64>,
    /// Unix seconds.
    pub published: Option<i64>,
}

/// Keep channel hits only, drop nameless ones, cap at `limit`.
pub fn normalize_search(items: Vec<SearchItem>, limit: usize) -> Vec<ChannelSummary> {
    items
        .into_iter()
        .filter(|it| it.kind.is_empty() || it.kind == "channel")
        .filter(|it| !it.author_id.is_empty())
        .take(limit)
        .map(|it| ChannelSummary {
            url: channel_url(&it.author_id),
            id: it.author_id,
            name: clean_text(&it.author),
            subscribers: it.sub_count,
            video_count: it.video_count,
            description: clean_text(&it.description),
        })
        .collect()
}

pub fn normalize_channel(raw: RawChannel) -> Result<ChannelRecord, ProviderError> {
    if raw.author_id.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "channel payload without authorId".into(),
        ));
    }

    let videos: Vec<VideoRecord> = raw
        .latest_videos
        .into_iter()
        .filter(|v| !v.video_id.is_empty())
        .map(|v| VideoRecord {
            id: v.video_id,
            title: clean_text(&v.title),
            description: clean_text(&v.description),
            views: v.view_count.unwrap_or(0),
            likes: v.like_count,
            duration_secs: v.length_seconds.unwrap_or(0),
            published_at: v.published.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        })
        .collect();

    let total_views = raw
        .total_views
        .unwrap_or_else(|| videos.iter().map(|v| v.views).sum());

    Ok(ChannelRecord {
        url: channel_url(&raw.author_id),
        id: raw.author_id,
        name: clean_text(&raw.author),
        description: clean_text(&raw.description),
        subscribers: raw.sub_count.unwrap_or(0),
        total_views,
        video_count: raw.video_count.unwrap_or(videos.len() as u64),
        videos,
    })
}

/// Minimal percent-encoding for query values and path segments.
fn encode_query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
