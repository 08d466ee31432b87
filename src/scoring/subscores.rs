//! The five sub-scores behind a niche's total.
//!
//! | category             | max | live input                         | fallback |
//! |----------------------|-----|------------------------------------|----------|
//! | search_volume        | 25  | trend interest, else audience size | 10 (+5 if monetization matched a keyword) |
//! | competition          | 25  | median subscribers of top channels | 12 |
//! | monetization         | 20  | estimated rate (keyword match)     | same formula, marked estimated |
//! | content_availability | 15  | mean faceless score                | 7 (+5 if the niche names a faceless format) |
//! | trend_momentum       | 15  | mean rising-star score             | 7 |
//!
//! Every sub-score is an integer clamped to its maximum, so the total is the
//! plain sum and can never exceed 100.

use serde::Serialize;

use crate::classifier::{ContentTable, ContentTypeVerdict, GrowthEstimate};
use crate::model::{ChannelRecord, ChannelSummary, Provenance};
use crate::monetization::{MatchKind, MonetizationEstimate};

pub const SEARCH_VOLUME_MAX: u32 = 25;
pub const COMPETITION_MAX: u32 = 25;
pub const MONETIZATION_MAX: u32 = 20;
pub const CONTENT_AVAILABILITY_MAX: u32 = 15;
pub const TREND_MOMENTUM_MAX: u32 = 15;

/// Rate (USD per 1000 views) that earns the full monetization allocation.
const FULL_MONETIZATION_RATE: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScore {
    pub points: u32,
    pub max_points: u32,
    pub rationale: String,
    pub provenance: Provenance,
}

impl SubScore {
    fn new(points: u32, max_points: u32, provenance: Provenance, rationale: String) -> Self {
        Self {
            points: points.min(max_points),
            max_points,
            rationale,
            provenance,
        }
    }

    fn live(points: u32, max_points: u32, rationale: String) -> Self {
        Self::new(points, max_points, Provenance::Live, rationale)
    }

    fn estimated(points: u32, max_points: u32, rationale: String) -> Self {
        Self::new(points, max_points, Provenance::Estimated, rationale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub search_volume: SubScore,
    pub competition: SubScore,
    pub monetization: SubScore,
    pub content_availability: SubScore,
    pub trend_momentum: SubScore,
}

impl ScoreBreakdown {
    pub fn compute(inputs: &ScoringInputs<'_>) -> Self {
        Self {
            search_volume: search_volume(inputs),
            competition: competition(inputs),
            monetization: monetization(inputs.monetization),
            content_availability: content_availability(inputs),
            trend_momentum: trend_momentum(inputs),
        }
    }

    pub fn parts(&self) -> [&SubScore; 5] {
        [
            &self.search_volume,
            &self.competition,
            &self.monetization,
            &self.content_availability,
            &self.trend_momentum,
        ]
    }

    /// Exact sum of the five sub-scores.
    pub fn total(&self) -> u32 {
        self.parts().iter().map(|s| s.points).sum()
    }
}

/// A fetched channel with its classification and growth estimate.
#[derive(Debug, Clone)]
pub struct AnalyzedChannel {
    pub record: ChannelRecord,
    pub verdict: ContentTypeVerdict,
    pub growth: GrowthEstimate,
}

/// Whatever data the request managed to gather.
pub struct ScoringInputs<'a> {
    pub niche: &'a str,
    /// 0–100 trend interest, when a trend provider answered.
    pub interest: Option<f32>,
    /// `None` when the search itself failed.
    pub search: Option<&'a [ChannelSummary]>,
    pub channels: &'a [AnalyzedChannel],
    pub monetization: &'a MonetizationEstimate,
    pub content_table: &'a ContentTable,
}

fn scaled(fraction: f64, max: u32) -> u32 {
    (fraction.clamp(0.0, 1.0) * max as f64).round() as u32
}

fn step(value: u64, steps: &[(u64, u32)], below: u32) -> u32 {
    steps
        .iter()
        .find(|(min, _)| value >= *min)
        .map(|(_, p)| *p)
        .unwrap_or(below)
}

fn keyword_matched(m: &MonetizationEstimate) -> bool {
    matches!(m.match_kind, MatchKind::Exact | MatchKind::Fuzzy)
}

fn search_volume(inputs: &ScoringInputs<'_>) -> SubScore {
    if let Some(interest) = inputs.interest {
        return SubScore::live(
            scaled(interest as f64 / 100.0, SEARCH_VOLUME_MAX),
            SEARCH_VOLUME_MAX,
            format!("trend interest {interest:.0}/100 over the lookback window"),
        );
    }

    let audience: u64 = if inputs.channels.is_empty() {
        inputs
            .search
            .unwrap_or_default()
            .iter()
            .filter_map(|c| c.subscribers)
            .sum()
    } else {
        inputs.channels.iter().map(|c| c.record.subscribers).sum()
    };
    if audience > 0 {
        let points = step(
            audience,
            &[(10_000_000, 22), (1_000_000, 18), (100_000, 14), (10_000, 10)],
            6,
        );
        return SubScore::live(
            points,
            SEARCH_VOLUME_MAX,
            format!("top channels reach about {audience} subscribers combined"),
        );
    }

    let bonus = if keyword_matched(inputs.monetization) { 5 } else { 0 };
    SubScore::estimated(
        10 + bonus,
        SEARCH_VOLUME_MAX,
        if bonus > 0 {
            "no trend or audience data; baseline plus a recognized-topic bonus".to_string()
        } else {
            "no trend or audience data; baseline estimate".to_string()
        },
    )
}

fn median(mut values: Vec<u64>) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2
    } else {
        values[mid]
    })
}

fn competition(inputs: &ScoringInputs<'_>) -> SubScore {
    let subs: Vec<u64> = if inputs.channels.is_empty() {
        inputs
            .search
            .unwrap_or_default()
            .iter()
            .filter_map(|c| c.subscribers)
            .filter(|s| *s > 0)
            .collect()
    } else {
        inputs
            .channels
            .iter()
            .map(|c| c.record.subscribers)
            .filter(|s| *s > 0)
            .collect()
    };

    match median(subs) {
        Some(m) => {
            // Smaller incumbents leave more room for a newcomer.
            let points = if m < 10_000 {
                25
            } else if m < 100_000 {
                20
            } else if m < 500_000 {
                15
            } else if m < 1_000_000 {
                10
            } else if m < 5_000_000 {
                6
            } else {
                3
            };
            SubScore::live(
                points,
                COMPETITION_MAX,
                format!("median top-channel audience is {m} subscribers"),
            )
        }
        None => SubScore::estimated(
            12,
            COMPETITION_MAX,
            "no subscriber data for competing channels; neutral estimate".to_string(),
        ),
    }
}

fn monetization(m: &MonetizationEstimate) -> SubScore {
    let points = scaled(m.rate / FULL_MONETIZATION_RATE, MONETIZATION_MAX);
    let rationale = format!(
        "{} at ${:.2} per 1000 views ({:?} match, confidence {:.2})",
        m.category, m.rate, m.match_kind, m.confidence
    );
    if keyword_matched(m) {
        SubScore::live(points, MONETIZATION_MAX, rationale)
    } else {
        SubScore::estimated(points, MONETIZATION_MAX, rationale)
    }
}

/// True when the niche text itself names a faceless format ("asmr", "compilation", ...).
pub fn niche_names_faceless_format(niche: &str, table: &ContentTable) -> bool {
    let lower = niche.to_lowercase();
    table
        .labels
        .iter()
        .filter(|rule| rule.faceless)
        .flat_map(|rule| rule.indicators.iter())
        .any(|ind| lower.contains(&ind.phrase))
}

fn content_availability(inputs: &ScoringInputs<'_>) -> SubScore {
    if !inputs.channels.is_empty() {
        let n = inputs.channels.len();
        let sum: u32 = inputs.channels.iter().map(|c| c.verdict.faceless_score).sum();
        let avg = sum as f64 / n as f64;
        let faceless = inputs
            .channels
            .iter()
            .filter(|c| c.verdict.faceless_score >= inputs.content_table.floor)
            .count();
        return SubScore::live(
            scaled(avg / 100.0, CONTENT_AVAILABILITY_MAX),
            CONTENT_AVAILABILITY_MAX,
            format!("{faceless} of {n} sampled channels look faceless (mean faceless score {avg:.0})"),
        );
    }

    if niche_names_faceless_format(inputs.niche, inputs.content_table) {
        SubScore::estimated(
            12,
            CONTENT_AVAILABILITY_MAX,
            "no channel data; niche names a faceless-friendly format".to_string(),
        )
    } else {
        SubScore::estimated(
            7,
            CONTENT_AVAILABILITY_MAX,
            "no channel data; neutral estimate".to_string(),
        )
    }
}

fn trend_momentum(inputs: &ScoringInputs<'_>) -> SubScore {
    let dated: Vec<u32> = inputs
        .channels
        .iter()
        .filter(|c| {
            c.growth.view_velocity.provenance == Provenance::Live
                || c.growth.upload_acceleration.provenance == Provenance::Live
        })
        .map(|c| c.growth.rising_star_score)
        .collect();

    if dated.is_empty() {
        return SubScore::estimated(
            7,
            TREND_MOMENTUM_MAX,
            "no dated upload history for sampled channels; neutral estimate".to_string(),
        );
    }
    let avg = dated.iter().sum::<u32>() as f64 / dated.len() as f64;
    SubScore::live(
        scaled(avg / 100.0, TREND_MOMENTUM_MAX),
        TREND_MOMENTUM_MAX,
        format!(
            "mean rising-star score {avg:.0} across {} channels with upload history",
            dated.len()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monetization::{GeoMultiplier, SeasonalMultiplier};

    fn estimate(kind: MatchKind, rate: f64) -> MonetizationEstimate {
        MonetizationEstimate {
            niche: "n".into(),
            category: "x".into(),
            match_kind: kind,
            matched: None,
            base_rate: rate,
            rate,
            rate_low: rate,
            rate_high: rate,
            confidence: 0.3,
            geo: GeoMultiplier {
                region: None,
                value: 1.0,
                listed: false,
            },
            seasonal: SeasonalMultiplier {
                month: 9,
                value: 1.0,
            },
        }
    }

    fn table() -> ContentTable {
        ContentTable::embedded().unwrap()
    }

    #[test]
    fn no_data_uses_documented_fallbacks() {
        let m = estimate(MatchKind::Default, 2.5);
        let t = table();
        let b = ScoreBreakdown::compute(&ScoringInputs {
            niche: "xyzzy",
            interest: None,
            search: None,
            channels: &[],
            monetization: &m,
            content_table: &t,
        });
        assert_eq!(b.search_volume.points, 10);
        assert_eq!(b.competition.points, 12);
        assert_eq!(b.content_availability.points, 7);
        assert_eq!(b.trend_momentum.points, 7);
        // 2.5 / 15 * 20 = 3.33
        assert_eq!(b.monetization.points, 3);
        assert!(b.parts().iter().all(|p| p.provenance == Provenance::Estimated));
        assert_eq!(b.total(), 10 + 12 + 3 + 7 + 7);
    }

    #[test]
    fn recognized_topic_and_faceless_format_raise_fallbacks() {
        let m = estimate(MatchKind::Exact, 3.5);
        let t = table();
        let b = ScoreBreakdown::compute(&ScoringInputs {
            niche: "asmr sleep sounds",
            interest: None,
            search: Some(&[][..]),
            channels: &[],
            monetization: &m,
            content_table: &t,
        });
        assert_eq!(b.search_volume.points, 15);
        assert_eq!(b.content_availability.points, 12);
        assert_eq!(b.monetization.provenance, Provenance::Live);
    }

    #[test]
    fn trend_interest_drives_search_volume() {
        let m = estimate(MatchKind::Exact, 30.0);
        let t = table();
        let b = ScoreBreakdown::compute(&ScoringInputs {
            niche: "n",
            interest: Some(100.0),
            search: None,
            channels: &[],
            monetization: &m,
            content_table: &t,
        });
        assert_eq!(b.search_volume.points, SEARCH_VOLUME_MAX);
        assert_eq!(b.search_volume.provenance, Provenance::Live);
        assert_eq!(b.monetization.points, MONETIZATION_MAX);
    }

    #[test]
    fn competition_from_search_subscribers() {
        let m = estimate(MatchKind::Default, 2.5);
        let t = table();
        let hits: Vec<ChannelSummary> = [5_000u64, 8_000, 2_000_000]
            .iter()
            .enumerate()
            .map(|(i, s)| ChannelSummary {
                id: format!("UC{i}"),
                name: format!("c{i}"),
                url: String::new(),
                subscribers: Some(*s),
                video_count: None,
                description: String::new(),
            })
            .collect();
        let b = ScoreBreakdown::compute(&ScoringInputs {
            niche: "n",
            interest: None,
            search: Some(hits.as_slice()),
            channels: &[],
            monetization: &m,
            content_table: &t,
        });
        assert_eq!(b.competition.points, 25);
        assert_eq!(b.competition.provenance, Provenance::Live);
        // 2_013_000 combined subscribers
        assert_eq!(b.search_volume.points, 18);
    }

    #[test]
    fn median_handles_even_counts() {
        assert_eq!(median(vec![4, 1, 3, 2]), Some(2));
        assert_eq!(median(vec![]), None);
    }
}
