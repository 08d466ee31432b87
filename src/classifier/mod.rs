//! # Content Classifier
//! Heuristic "faceless" content-type detection from channel metadata.
//!
//! Pure and deterministic: keyword indicators from a data table plus how well
//! the channel's median video duration and upload frequency fit each label's
//! expected ranges. No network access.

pub mod growth;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ChannelRecord;

pub use growth::{estimate_growth, GrowthComponent, GrowthEstimate};

const EMBEDDED_TABLE: &str = include_str!("../../config/content_types.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    FacelessVoiceover,
    Compilation,
    ScreenRecording,
    Tutorial,
    PossiblyFaceless,
    Unknown,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FacelessVoiceover => "faceless_voiceover",
            Self::Compilation => "compilation",
            Self::ScreenRecording => "screen_recording",
            Self::Tutorial => "tutorial",
            Self::PossiblyFaceless => "possibly_faceless",
            Self::Unknown => "unknown",
        }
    }
}

/* ----------------------------
Table schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct Indicator {
    pub phrase: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelRule {
    pub label: ContentType,
    #[serde(default)]
    pub faceless: bool,
    pub duration_minutes: [f64; 2],
    pub uploads_per_week: [f64; 2],
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentTable {
    pub floor: u32,
    pub saturation: f64,
    pub keyword_points: u32,
    pub duration_points: u32,
    pub frequency_points: u32,
    pub channel_text_weight: f64,
    pub video_text_weight: f64,
    pub labels: Vec<LabelRule>,
}

impl ContentTable {
    /// Table compiled into the binary from `config/content_types.toml`.
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_toml_str(EMBEDDED_TABLE)
    }

    /// Load an override table, or the embedded one when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = fs::read_to_string(p)
                    .with_context(|| format!("reading content table at {}", p.display()))?;
                Self::from_toml_str(&content)
            }
            None => Self::embedded(),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut table: ContentTable = toml::from_str(s).context("parsing content table")?;

        if table.labels.is_empty() {
            bail!("content table has no labels");
        }
        if table.floor > 100 || table.saturation <= 0.0 {
            bail!("content table floor must be <= 100 and saturation > 0");
        }
        if table.keyword_points + table.duration_points + table.frequency_points > 100 {
            bail!("content table point allocations exceed 100");
        }
        for rule in &mut table.labels {
            if rule.label == ContentType::Unknown {
                bail!("`unknown` is implicit and cannot appear in the content table");
            }
            if rule.duration_minutes[0] > rule.duration_minutes[1]
                || rule.uploads_per_week[0] > rule.uploads_per_week[1]
            {
                bail!("label `{}` has an inverted range", rule.label.as_str());
            }
            for ind in &mut rule.indicators {
                ind.phrase = ind.phrase.trim().to_lowercase();
            }
            rule.indicators.retain(|i| !i.phrase.is_empty());
        }
        Ok(table)
    }
}

/* ----------------------------
Verdict
---------------------------- */

/// Per-label confidence, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub label: ContentType,
    pub confidence: u32,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentTypeVerdict {
    pub label: ContentType,
    /// 0–100.
    pub confidence: u32,
    pub matched_indicators: Vec<String>,
    /// Best confidence among labels flagged `faceless` in the table.
    pub faceless_score: u32,
    pub median_duration_minutes: Option<f64>,
    pub uploads_per_week: Option<f64>,
    pub scores: Vec<LabelScore>,
}

/// Classify a channel. Ties go to the label listed first in the table.
pub fn classify(record: &ChannelRecord, table: &ContentTable) -> ContentTypeVerdict {
    let channel_texts = [record.name.to_lowercase(), record.description.to_lowercase()];
    let video_texts: Vec<String> = record
        .videos
        .iter()
        .flat_map(|v| [v.title.to_lowercase(), v.description.to_lowercase()])
        .filter(|t| !t.is_empty())
        .collect();

    let median_duration = median_duration_minutes(record);
    let per_week = uploads_per_week(record);

    let mut scores = Vec::with_capacity(table.labels.len());
    for rule in &table.labels {
        let mut weighted = 0.0;
        let mut matched = Vec::new();
        for ind in &rule.indicators {
            let in_channel = channel_texts.iter().filter(|t| t.contains(&ind.phrase)).count();
            let in_videos = video_texts.iter().filter(|t| t.contains(&ind.phrase)).count();
            if in_channel + in_videos == 0 {
                continue;
            }
            weighted += ind.weight
                * (in_channel as f64 * table.channel_text_weight
                    + in_videos as f64 * table.video_text_weight);
            matched.push(ind.phrase.clone());
        }

        let keyword_part = (weighted / table.saturation).min(1.0) * table.keyword_points as f64;
        let duration_part = match median_duration {
            Some(m) if in_range(m, rule.duration_minutes) => table.duration_points,
            _ => 0,
        };
        let frequency_part = match per_week {
            Some(f) if in_range(f, rule.uploads_per_week) => table.frequency_points,
            _ => 0,
        };
        let confidence =
            (keyword_part.round() as u32 + duration_part + frequency_part).min(100);

        scores.push(LabelScore {
            label: rule.label,
            confidence,
            matched,
        });
    }

    let best = scores
        .iter()
        .fold(None::<&LabelScore>, |acc, s| match acc {
            Some(b) if b.confidence >= s.confidence => Some(b),
            _ => Some(s),
        });

    let faceless_score = table
        .labels
        .iter()
        .zip(&scores)
        .filter(|(rule, _)| rule.faceless)
        .map(|(_, s)| s.confidence)
        .max()
        .unwrap_or(0);

    let (label, confidence, matched_indicators) = match best {
        Some(b) if b.confidence >= table.floor => (b.label, b.confidence, b.matched.clone()),
        Some(b) => {
            let mut all: Vec<String> = scores.iter().flat_map(|s| s.matched.clone()).collect();
            all.sort();
            all.dedup();
            (ContentType::Unknown, b.confidence, all)
        }
        None => (ContentType::Unknown, 0, Vec::new()),
    };

    ContentTypeVerdict {
        label,
        confidence,
        matched_indicators,
        faceless_score,
        median_duration_minutes: median_duration,
        uploads_per_week: per_week,
        scores,
    }
}

fn in_range(x: f64, range: [f64; 2]) -> bool {
    x >= range[0] && x <= range[1]
}

/// Median of non-zero video durations, in minutes.
pub fn median_duration_minutes(record: &ChannelRecord) -> Option<f64> {
    let mut mins: Vec<f64> = record
        .videos
        .iter()
        .filter(|v| v.duration_secs > 0)
        .map(|v| v.duration_secs as f64 / 60.0)
        .collect();
    if mins.is_empty() {
        return None;
    }
    mins.sort_by(|a, b| a.total_cmp(b));
    let mid = mins.len() / 2;
    Some(if mins.len() % 2 == 0 {
        (mins[mid - 1] + mins[mid]) / 2.0
    } else {
        mins[mid]
    })
}

/// Uploads per week over the span covered by dated videos (needs two dates).
pub fn uploads_per_week(record: &ChannelRecord) -> Option<f64> {
    let dates: Vec<DateTime<Utc>> = record.videos.iter().filter_map(|v| v.published_at).collect();
    if dates.len() < 2 {
        return None;
    }
    let newest = dates.iter().max()?;
    let oldest = dates.iter().min()?;
    let span_days = ((*newest - *oldest).num_seconds() as f64 / 86_400.0).max(1.0);
    Some((dates.len() - 1) as f64 / span_days * 7.0)
}
