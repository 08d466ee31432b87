//! Shared data model: niche queries, channel/video records and provenance.
//!
//! Records are immutable once built; a fresh record from the gateway replaces
//! a stale one instead of being patched in place.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound for niche text after whitespace normalization.
pub const MAX_NICHE_CHARS: usize = 120;

/// Description length cap applied when normalizing provider text.
const MAX_TEXT_CHARS: usize = 1500;

/// One inbound request for a niche analysis. Immutable per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicheQuery {
    pub niche: String,
    /// ISO-3166 alpha-2 viewer country, upper-cased.
    #[serde(default)]
    pub region: Option<String>,
    /// Broad category hint ("finance", "gaming", ...) used by the monetization fallback.
    #[serde(default)]
    pub category_hint: Option<String>,
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

impl NicheQuery {
    pub fn new(niche: impl Into<String>) -> Self {
        Self {
            niche: niche.into(),
            region: None,
            category_hint: None,
            as_of: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_category_hint(mut self, hint: impl Into<String>) -> Self {
        self.category_hint = Some(hint.into());
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Trim and collapse the niche text, normalize optional fields, and reject
    /// input that cannot be searched.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let niche = self.niche.split_whitespace().collect::<Vec<_>>().join(" ");
        if niche.is_empty() {
            return Err(ValidationError::Empty);
        }
        if niche.chars().count() > MAX_NICHE_CHARS {
            return Err(ValidationError::TooLong {
                max: MAX_NICHE_CHARS,
            });
        }
        if !niche.chars().any(char::is_alphanumeric) {
            return Err(ValidationError::NoSearchableText);
        }

        let region = self
            .region
            .map(|r| r.trim().to_ascii_uppercase())
            .filter(|r| !r.is_empty());
        let category_hint = self
            .category_hint
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty());

        Ok(Self {
            niche,
            region,
            category_hint,
            as_of: self.as_of,
        })
    }

    /// Reference instant for windows and seasonality.
    pub fn as_of_or_now(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

/// Search hit for a channel; lighter than a full `ChannelRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub url: String,
    pub subscribers: Option<u64>,
    pub video_count: Option<u64>,
    #[serde(default)]
    pub description: String,
}

/// Channel profile plus its recent uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// 0 when the provider did not report it.
    pub subscribers: u64,
    pub total_views: u64,
    pub video_count: u64,
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub views: u64,
    pub likes: Option<u64>,
    pub duration_secs: u64,
    pub published_at: Option<DateTime<Utc>>,
}

/// Where a number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Derived from upstream data or a table match.
    Live,
    /// Deterministic fallback heuristic; no live data was available.
    Estimated,
    /// A comparison window was empty, so a fixed neutral midpoint was used.
    InsufficientData,
}

/// Canonical channel URL for an id.
pub fn channel_url(id: &str) -> String {
    format!("https://www.youtube.com/channel/{id}")
}

/// Normalize provider text: decode entities, strip tags, fold typographic
/// quotes, collapse whitespace and cap the length.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}
