//! Secondary, tool-based provider: an external extractor invoked as a
//! subprocess that prints one JSON object per line.
//!
//! `ProcessAdapter` is the seam: the gateway only sees `invoke(request)`, so
//! tests swap in a scripted adapter instead of spawning processes. The
//! normalizers below turn the tool's lines into the same `ChannelSummary` /
//! `ChannelRecord` shapes the primary provider produces.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;
use crate::model::{channel_url, clean_text, ChannelRecord, ChannelSummary, VideoRecord};

/// What the gateway asks the tool for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    Search { query: String, limit: usize },
    ChannelVideos { channel_id: String, limit: usize },
}

/// Parsed line-delimited output.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub lines: Vec<Value>,
}

impl ToolOutput {
    /// Parse stdout, skipping blank or non-JSON lines. Zero usable lines is
    /// a malformed response.
    pub fn parse(stdout: &[u8]) -> Result<Self, ProviderError> {
        let text = String::from_utf8_lossy(stdout);
        let lines: Vec<Value> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .filter(Value::is_object)
            .collect();
        if lines.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "tool produced no JSON lines".into(),
            ));
        }
        Ok(Self { lines })
    }
}

/// Narrow adapter around the external process.
#[async_trait]
pub trait ProcessAdapter: Send + Sync {
    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ProviderError>;
    fn name(&self) -> &'static str;
}

/// Runs a yt-dlp compatible binary with `--dump-json --flat-playlist`.
pub struct YtDlpAdapter {
    binary: String,
    timeout: Duration,
}

impl YtDlpAdapter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn build_args(request: &ToolRequest) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--ignore-errors".to_string(),
        ];
        match request {
            ToolRequest::Search { query, limit } => {
                args.push(format!("ytsearch{limit}:{query}"));
            }
            ToolRequest::ChannelVideos { channel_id, limit } => {
                args.push("--playlist-end".to_string());
                args.push(limit.to_string());
                args.push(format!("{}/videos", channel_url(channel_id)));
            }
        }
        args
    }
}

#[async_trait]
impl ProcessAdapter for YtDlpAdapter {
    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ProviderError> {
        let args = Self::build_args(request);
        debug!(target: "gateway", binary = %self.binary, ?request, "invoking secondary tool");

        let out = run_output_with_timeout(&self.binary, &args, self.timeout).await?;
        if !out.status.success() && out.stdout.is_empty() {
            return Err(classify_stderr(&String::from_utf8_lossy(&out.stderr)));
        }
        ToolOutput::parse(&out.stdout)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Spawn `program`, capture stdout/stderr, and kill it if it outlives `limit`.
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    limit: Duration,
) -> Result<std::process::Output, ProviderError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ProviderError::ToolUnavailable(format!("{program} not found"))
            }
            _ => ProviderError::Transport(format!("failed to start {program}: {e}")),
        })?;

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(out)) => Ok(out),
        Ok(Err(e)) => Err(ProviderError::Transport(format!(
            "failed to collect {program} output: {e}"
        ))),
        // Dropping the future drops the child, which kills it.
        Err(_) => Err(ProviderError::Timeout(limit.as_millis() as u64)),
    }
}

fn classify_stderr(stderr: &str) -> ProviderError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("rate-limit")
        || lower.contains("not a bot")
    {
        return ProviderError::RateLimited;
    }
    let first = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    ProviderError::Transport(format!("tool failed: {}", first.trim()))
}

/* ----------------------------
Normalization
---------------------------- */

fn str_field<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| v.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn u64_field(v: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        let f = v.get(*k)?;
        f.as_u64().or_else(|| f.as_f64().map(|x| x.max(0.0) as u64))
    })
}

fn published_at(v: &Value) -> Option<DateTime<Utc>> {
    if let Some(ts) = v
        .get("timestamp")
        .or_else(|| v.get("release_timestamp"))
        .and_then(Value::as_i64)
    {
        return DateTime::<Utc>::from_timestamp(ts, 0);
    }
    let raw = v.get("upload_date").and_then(Value::as_str)?;
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Group search lines by channel, keeping first-seen order.
pub fn normalize_search(output: &ToolOutput, limit: usize) -> Vec<ChannelSummary> {
    let mut out: Vec<ChannelSummary> = Vec::new();
    for line in &output.lines {
        let Some(id) = str_field(line, &["channel_id", "uploader_id"]) else {
            continue;
        };
        if out.iter().any(|c| c.id == id) {
            continue;
        }
        out.push(ChannelSummary {
            id: id.to_string(),
            name: clean_text(str_field(line, &["channel", "uploader"]).unwrap_or(id)),
            url: str_field(line, &["channel_url", "uploader_url"])
                .map(str::to_string)
                .unwrap_or_else(|| channel_url(id)),
            subscribers: u64_field(line, &["channel_follower_count"]),
            video_count: None,
            description: String::new(),
        });
        if out.len() >= limit {
            break;
        }
    }
    out
}

/// Build a channel record from the tool's listing of the channel's uploads.
pub fn normalize_channel(
    channel_id: &str,
    output: &ToolOutput,
) -> Result<ChannelRecord, ProviderError> {
    let first = output
        .lines
        .first()
        .ok_or_else(|| ProviderError::MalformedResponse("empty channel listing".into()))?;

    let name = str_field(
        first,
        &["playlist_channel", "channel", "playlist_uploader", "uploader"],
    )
    .unwrap_or(channel_id);

    let subscribers = output
        .lines
        .iter()
        .find_map(|l| u64_field(l, &["channel_follower_count"]))
        .unwrap_or(0);

    let videos: Vec<VideoRecord> = output
        .lines
        .iter()
        .filter_map(|l| {
            let id = str_field(l, &["id"])?;
            Some(VideoRecord {
                id: id.to_string(),
                title: clean_text(str_field(l, &["title"]).unwrap_or_default()),
                description: clean_text(str_field(l, &["description"]).unwrap_or_default()),
                views: u64_field(l, &["view_count"]).unwrap_or(0),
                likes: u64_field(l, &["like_count"]),
                duration_secs: u64_field(l, &["duration"]).unwrap_or(0),
                published_at: published_at(l),
            })
        })
        .collect();

    if videos.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "channel listing without video ids".into(),
        ));
    }

    Ok(ChannelRecord {
        id: channel_id.to_string(),
        name: clean_text(name),
        url: channel_url(channel_id),
        description: String::new(),
        subscribers,
        total_views: videos.iter().map(|v| v.views).sum(),
        video_count: videos.len() as u64,
        videos,
    })
}
