//! # Scoring Engine
//! Turns one niche query into a 0–100 score with a per-category breakdown.
//!
//! Data flow per request:
//! - monetization estimate (tables only, never fails)
//! - channel search and trend interest, concurrently
//! - up to `channel_sample` channel records, concurrently, each classified
//!   and given a growth estimate
//! - five sub-scores, their sum, grade and recommendation
//!
//! Gateway exhaustion degrades the affected sub-scores to their documented
//! fallbacks; only invalid input fails the request.

pub mod grade;
pub mod stage;
pub mod subscores;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::classifier::{classify, estimate_growth, ContentTable, ContentType};
use crate::error::{DiscoveryError, ValidationError};
use crate::gateway::Gateway;
use crate::model::{ChannelSummary, NicheQuery, Provenance};
use crate::monetization::{MonetizationEstimate, MonetizationEstimator};
use crate::trends::{cached_interest, TrendSource};

pub use grade::Grade;
pub use stage::{RequestStages, Stage};
pub use subscores::{AnalyzedChannel, ScoreBreakdown, ScoringInputs, SubScore};

/// Compact per-channel view served by `/api/channels` and `rising_star_channels`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelInsight {
    pub id: String,
    pub name: String,
    pub url: String,
    pub subscribers: u64,
    pub total_views: u64,
    pub video_count: u64,
    pub rising_star_score: u32,
    pub growth_provenance: Provenance,
    pub content_type: ContentType,
    pub content_confidence: u32,
    pub faceless_score: u32,
}

impl From<&AnalyzedChannel> for ChannelInsight {
    fn from(c: &AnalyzedChannel) -> Self {
        Self {
            id: c.record.id.clone(),
            name: c.record.name.clone(),
            url: c.record.url.clone(),
            subscribers: c.record.subscribers,
            total_views: c.record.total_views,
            video_count: c.record.video_count,
            rising_star_score: c.growth.rising_star_score,
            growth_provenance: c.growth.provenance,
            content_type: c.verdict.label,
            content_confidence: c.verdict.confidence,
            faceless_score: c.verdict.faceless_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NicheAnalysis {
    pub niche_name: String,
    pub total_score: u32,
    pub grade: Grade,
    pub recommendation: String,
    pub breakdown: ScoreBreakdown,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rising_star_channels: Vec<ChannelInsight>,
    pub monetization: MonetizationEstimate,
    pub channels_analyzed: usize,
    /// Data that could not be gathered for this request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Channel records fetched per request.
    pub channel_sample: usize,
    pub trend_window_days: u32,
    /// Minimum rising-star score for `rising_star_channels`.
    pub rising_star_threshold: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            channel_sample: 5,
            trend_window_days: 90,
            rising_star_threshold: 60,
        }
    }
}

pub struct NicheAnalyzer {
    gateway: Arc<Gateway>,
    estimator: Arc<MonetizationEstimator>,
    content: Arc<ContentTable>,
    trends: Arc<dyn TrendSource>,
    settings: AnalyzerSettings,
}

impl NicheAnalyzer {
    pub fn new(
        gateway: Arc<Gateway>,
        estimator: Arc<MonetizationEstimator>,
        content: Arc<ContentTable>,
        trends: Arc<dyn TrendSource>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            gateway,
            estimator,
            content,
            trends,
            settings,
        }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn estimator(&self) -> &MonetizationEstimator {
        &self.estimator
    }

    pub async fn analyze(&self, query: NicheQuery) -> Result<NicheAnalysis, ValidationError> {
        let query = query.validate()?;
        let mut stages = RequestStages::start(&query.niche);
        let as_of = query.as_of_or_now();
        let mut warnings = Vec::new();

        let monetization = self.estimator.estimate(
            &query.niche,
            query.region.as_deref(),
            query.category_hint.as_deref(),
            as_of,
        );

        let (search, interest) = tokio::join!(
            self.gateway.search_channels(&query.niche),
            cached_interest(
                self.gateway.cache(),
                self.trends.as_ref(),
                &query.niche,
                self.settings.trend_window_days,
            ),
        );

        let hits: Option<Vec<ChannelSummary>> = match search {
            Ok(fetched) => Some(fetched.value),
            Err(e) => {
                warn!(target: "scoring", niche = %query.niche, error = %e, "channel search unavailable; using fallbacks");
                warnings.push(format!("channel search unavailable: {e}"));
                None
            }
        };
        let channels = match &hits {
            Some(h) => self.fetch_channels(h, as_of, &mut warnings).await,
            None => Vec::new(),
        };
        stages.advance();

        let breakdown = ScoreBreakdown::compute(&ScoringInputs {
            niche: &query.niche,
            interest,
            search: hits.as_deref(),
            channels: &channels,
            monetization: &monetization,
            content_table: &self.content,
        });
        let total_score = breakdown.total();
        let grade = Grade::from_total(total_score);
        stages.advance();

        let mut rising_star_channels: Vec<ChannelInsight> = channels
            .iter()
            .filter(|c| c.growth.rising_star_score >= self.settings.rising_star_threshold)
            .map(ChannelInsight::from)
            .collect();
        sort_by_rising_star(&mut rising_star_channels);

        let elapsed_ms = stages.elapsed_ms();
        counter!("analysis_total", "grade" => grade.as_str()).increment(1);
        histogram!("analysis_ms").record(elapsed_ms);
        info!(
            target: "scoring",
            niche = %query.niche,
            total_score,
            grade = grade.as_str(),
            channels = channels.len(),
            elapsed_ms,
            "niche scored"
        );
        stages.advance();

        Ok(NicheAnalysis {
            niche_name: query.niche,
            total_score,
            grade,
            recommendation: grade.recommendation().to_string(),
            breakdown,
            rising_star_channels,
            monetization,
            channels_analyzed: channels.len(),
            warnings,
            as_of,
        })
    }

    /// Channels found for the niche, best rising-star score first. Unlike
    /// `analyze`, a failed search is an error here since there is nothing to list.
    pub async fn discover_channels(
        &self,
        query: NicheQuery,
    ) -> Result<Vec<ChannelInsight>, DiscoveryError> {
        let query = query.validate()?;
        let as_of = query.as_of_or_now();
        let hits = self.gateway.search_channels(&query.niche).await?.value;

        let mut warnings = Vec::new();
        let channels = self.fetch_channels(&hits, as_of, &mut warnings).await;
        let mut out: Vec<ChannelInsight> = channels.iter().map(ChannelInsight::from).collect();
        sort_by_rising_star(&mut out);

        info!(
            target: "scoring",
            niche = %query.niche,
            found = hits.len(),
            listed = out.len(),
            dropped = warnings.len(),
            "channels discovered"
        );
        Ok(out)
    }

    /// Fetch, classify and estimate growth for the first `channel_sample`
    /// hits concurrently. A channel that cannot be fetched is dropped and
    /// noted in `warnings`.
    async fn fetch_channels(
        &self,
        hits: &[ChannelSummary],
        as_of: DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> Vec<AnalyzedChannel> {
        let mut set = JoinSet::new();
        for (idx, hit) in hits.iter().take(self.settings.channel_sample).enumerate() {
            let gateway = self.gateway.clone();
            let id = hit.id.clone();
            set.spawn(async move {
                let result = gateway.channel(&id).await;
                (idx, id, result)
            });
        }

        let mut fetched = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, _, Ok(f))) => fetched.push((idx, f.value)),
                Ok((_, id, Err(e))) => {
                    warn!(target: "scoring", channel = %id, error = %e, "channel unavailable");
                    warnings.push(format!("channel {id} unavailable: {e}"));
                }
                Err(e) => warn!(target: "scoring", error = %e, "channel task failed"),
            }
        }
        // Keep search order so results do not depend on completion order.
        fetched.sort_by_key(|(idx, _)| *idx);

        fetched
            .into_iter()
            .map(|(_, record)| {
                let verdict = classify(&record, &self.content);
                let growth = estimate_growth(&record, as_of);
                AnalyzedChannel {
                    record,
                    verdict,
                    growth,
                }
            })
            .collect()
    }
}

fn sort_by_rising_star(list: &mut [ChannelInsight]) {
    list.sort_by(|a, b| {
        b.rising_star_score
            .cmp(&a.rising_star_score)
            .then_with(|| b.subscribers.cmp(&a.subscribers))
            .then_with(|| a.id.cmp(&b.id))
    });
}
