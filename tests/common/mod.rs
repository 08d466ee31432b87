// tests/common/mod.rs
//
// Scripted providers shared by the integration tests. Nothing here opens a
// socket or spawns a process.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use niche_scout::cache::{CacheTtls, TtlCache};
use niche_scout::classifier::ContentTable;
use niche_scout::error::ProviderError;
use niche_scout::gateway::{
    Gateway, GatewaySettings, InstancePool, PrimaryApi, ProcessAdapter, SharedCache, ToolOutput,
    ToolRequest,
};
use niche_scout::model::{channel_url, ChannelRecord, ChannelSummary, VideoRecord};
use niche_scout::monetization::{MonetizationEstimator, MonetizationTable};
use niche_scout::scoring::{AnalyzerSettings, NicheAnalyzer};
use niche_scout::trends::TrendSource;

pub const INSTANCES: [&str; 4] = [
    "https://inst-a.test",
    "https://inst-b.test",
    "https://inst-c.test",
    "https://inst-d.test",
];

pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Settings with no retry delay and short timeouts.
pub fn fast_settings() -> GatewaySettings {
    GatewaySettings {
        max_attempts: 4,
        request_timeout: Duration::from_millis(200),
        retry_delay: Duration::ZERO,
        secondary_timeout: Duration::from_millis(500),
        search_limit: 10,
        video_limit: 30,
    }
}

pub fn new_cache() -> SharedCache {
    Arc::new(TtlCache::new(CacheTtls::default(), 500))
}

pub fn pool() -> InstancePool {
    InstancePool::new(
        INSTANCES.iter().map(|s| s.to_string()).collect(),
        Duration::from_secs(120),
        3,
    )
}

/* ----------------------------
Primary provider
---------------------------- */

#[derive(Clone, Debug)]
pub enum Behavior {
    Ok,
    Fail(ProviderError),
    /// Never answers; the gateway's timeout has to cut it off.
    Hang,
}

pub struct ScriptedPrimary {
    behaviors: HashMap<String, Behavior>,
    default: Behavior,
    search: Vec<ChannelSummary>,
    channels: HashMap<String, ChannelRecord>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedPrimary {
    pub fn all(default: Behavior) -> Self {
        Self {
            behaviors: HashMap::new(),
            default,
            search: Vec::new(),
            channels: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_instance(mut self, url: &str, b: Behavior) -> Self {
        self.behaviors.insert(url.to_string(), b);
        self
    }

    pub fn with_channels(mut self, records: Vec<ChannelRecord>) -> Self {
        self.search = records.iter().map(summary_of).collect();
        self.channels = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        self
    }

    /// Extra search hit with no channel record behind it.
    pub fn with_search_hit(mut self, hit: ChannelSummary) -> Self {
        self.search.push(hit);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn gate(&self, base_url: &str) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(base_url.to_string());
        let b = self
            .behaviors
            .get(base_url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        match b {
            Behavior::Ok => Ok(()),
            Behavior::Fail(e) => Err(e),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PrimaryApi for ScriptedPrimary {
    async fn search_channels(
        &self,
        base_url: &str,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<ChannelSummary>, ProviderError> {
        self.gate(base_url).await?;
        Ok(self.search.iter().take(limit).cloned().collect())
    }

    async fn channel(
        &self,
        base_url: &str,
        channel_id: &str,
    ) -> Result<ChannelRecord, ProviderError> {
        self.gate(base_url).await?;
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or(ProviderError::Http(404))
    }

    fn name(&self) -> &'static str {
        "scripted-primary"
    }
}

/* ----------------------------
Secondary provider
---------------------------- */

pub struct ScriptedTool {
    stdout: Result<String, ProviderError>,
    hang: bool,
    pub invocations: AtomicUsize,
    pub requests: Mutex<Vec<ToolRequest>>,
}

impl ScriptedTool {
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: Ok(stdout.to_string()),
            hang: false,
            invocations: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            stdout: Err(err),
            hang: false,
            invocations: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Never answers within any test timeout.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::ok(TOOL_SEARCH_STDOUT)
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessAdapter for ScriptedTool {
    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ProviderError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.hang {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        match &self.stdout {
            Ok(s) => ToolOutput::parse(s.as_bytes()),
            Err(e) => Err(e.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted-tool"
    }
}

/* ----------------------------
Trend provider
---------------------------- */

pub struct FixedTrends(pub Option<f32>);

#[async_trait]
impl TrendSource for FixedTrends {
    async fn interest(&self, _keyword: &str, _days: u32) -> Result<Option<f32>, ProviderError> {
        Ok(self.0)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/* ----------------------------
Wiring
---------------------------- */

pub fn gateway(
    primary: Arc<ScriptedPrimary>,
    tool: Option<Arc<ScriptedTool>>,
) -> Arc<Gateway> {
    let tool = tool.map(|t| t as Arc<dyn ProcessAdapter>);
    Arc::new(Gateway::new(new_cache(), pool(), primary, tool, fast_settings()))
}

pub fn analyzer(gateway: Arc<Gateway>, interest: Option<f32>) -> NicheAnalyzer {
    NicheAnalyzer::new(
        gateway,
        Arc::new(MonetizationEstimator::new(
            MonetizationTable::embedded().expect("monetization table"),
        )),
        Arc::new(ContentTable::embedded().expect("content table")),
        Arc::new(FixedTrends(interest)),
        AnalyzerSettings::default(),
    )
}

/* ----------------------------
Fixtures
---------------------------- */

pub fn summary_of(r: &ChannelRecord) -> ChannelSummary {
    ChannelSummary {
        id: r.id.clone(),
        name: r.name.clone(),
        url: r.url.clone(),
        subscribers: Some(r.subscribers),
        video_count: Some(r.video_count),
        description: r.description.clone(),
    }
}

pub fn video(title: &str, days_ago: i64, views: u64, minutes: u64) -> VideoRecord {
    VideoRecord {
        id: format!("{}-{days_ago}", title.len()),
        title: title.to_string(),
        description: String::new(),
        views,
        likes: None,
        duration_secs: minutes * 60,
        published_at: Some(as_of() - ChronoDuration::days(days_ago)),
    }
}

pub fn record(
    id: &str,
    name: &str,
    description: &str,
    subscribers: u64,
    videos: Vec<VideoRecord>,
) -> ChannelRecord {
    ChannelRecord {
        id: id.to_string(),
        name: name.to_string(),
        url: channel_url(id),
        description: description.to_string(),
        subscribers,
        total_views: videos.iter().map(|v| v.views).sum(),
        video_count: videos.len() as u64,
        videos,
    }
}

/// Small faceless meditation channel whose recent uploads outperform older ones.
pub fn rising_meditation_channel() -> ChannelRecord {
    record(
        "UCcalm",
        "Calm Meditation Music",
        "Ambient, relaxing soundscapes. No commentary.",
        2_000,
        vec![
            video("Relaxing ambient rain", 3, 9_000, 12),
            video("Deep sleep ambient", 10, 7_000, 15),
            video("Morning meditation music", 20, 8_000, 10),
            video("Ambient focus", 45, 1_500, 12),
            video("Relaxing piano", 90, 1_000, 14),
            video("Ambient night", 150, 1_200, 11),
        ],
    )
}

/// Large, slowing vlog channel with no faceless indicators.
pub fn established_vlog_channel() -> ChannelRecord {
    record(
        "UCvlog",
        "Daily Life with Sam",
        "My life, my family, my adventures.",
        3_000_000,
        vec![
            video("We moved house", 5, 40_000, 25),
            video("Family trip", 40, 60_000, 24),
            video("Q&A", 50, 55_000, 30),
            video("Birthday", 100, 120_000, 28),
        ],
    )
}

/// Yt-dlp style flat-playlist search output for two channels.
pub const TOOL_SEARCH_STDOUT: &str = r#"{"id":"v1","title":"Rain sounds","channel":"Calm Meditation Music","channel_id":"UCcalm","channel_follower_count":2000}
{"id":"v2","title":"Ocean waves","channel":"Calm Meditation Music","channel_id":"UCcalm"}
{"id":"v3","title":"Sleep music","channel":"Night Sounds","channel_id":"UCnight","channel_follower_count":45000}"#;
