// tests/scoring_invariants.rs
//
// End-to-end scoring through NicheAnalyzer with scripted providers:
// - total is the exact sum of bounded sub-scores, for live and degraded data
// - provider exhaustion degrades sub-scores instead of failing the request
// - rising-star channels and channel discovery ordering

mod common;

use std::sync::Arc;

use common::{Behavior, ScriptedPrimary};
use niche_scout::error::{DiscoveryError, ProviderError, ValidationError};
use niche_scout::model::{ChannelSummary, NicheQuery, Provenance};
use niche_scout::monetization::MatchKind;
use niche_scout::scoring::subscores::{
    COMPETITION_MAX, CONTENT_AVAILABILITY_MAX, MONETIZATION_MAX, SEARCH_VOLUME_MAX,
    TREND_MOMENTUM_MAX,
};
use niche_scout::scoring::{Grade, NicheAnalysis};

fn live_primary() -> Arc<ScriptedPrimary> {
    Arc::new(ScriptedPrimary::all(Behavior::Ok).with_channels(vec![
        common::rising_meditation_channel(),
        common::established_vlog_channel(),
    ]))
}

fn down_primary() -> Arc<ScriptedPrimary> {
    Arc::new(ScriptedPrimary::all(Behavior::Fail(ProviderError::Timeout(8000))))
}

fn query(niche: &str) -> NicheQuery {
    NicheQuery::new(niche).with_as_of(common::as_of())
}

fn assert_invariants(a: &NicheAnalysis) {
    let b = &a.breakdown;
    assert!(b.search_volume.points <= SEARCH_VOLUME_MAX);
    assert!(b.competition.points <= COMPETITION_MAX);
    assert!(b.monetization.points <= MONETIZATION_MAX);
    assert!(b.content_availability.points <= CONTENT_AVAILABILITY_MAX);
    assert!(b.trend_momentum.points <= TREND_MOMENTUM_MAX);

    let sum = b.search_volume.points
        + b.competition.points
        + b.monetization.points
        + b.content_availability.points
        + b.trend_momentum.points;
    assert_eq!(a.total_score, sum);
    assert!(a.total_score <= 100);
    assert_eq!(a.grade, Grade::from_total(a.total_score));
    assert_eq!(a.recommendation, a.grade.recommendation());
    for part in b.parts() {
        assert!(!part.rationale.is_empty());
    }
}

#[tokio::test]
async fn live_data_produces_bounded_exact_sum() {
    let analyzer = common::analyzer(common::gateway(live_primary(), None), Some(80.0));
    let a = analyzer.analyze(query("meditation music")).await.unwrap();

    assert_invariants(&a);
    assert_eq!(a.niche_name, "meditation music");
    assert_eq!(a.channels_analyzed, 2);
    assert!(a.warnings.is_empty());

    assert_eq!(a.breakdown.search_volume.points, 20);
    assert_eq!(a.breakdown.search_volume.provenance, Provenance::Live);
    assert_eq!(a.breakdown.competition.provenance, Provenance::Live);
    assert_eq!(a.breakdown.content_availability.provenance, Provenance::Live);
    assert_eq!(a.breakdown.trend_momentum.provenance, Provenance::Live);
    assert_eq!(a.monetization.category, "meditation");
    assert_eq!(a.monetization.match_kind, MatchKind::Exact);
}

#[tokio::test]
async fn rising_star_channels_are_attached() {
    let analyzer = common::analyzer(common::gateway(live_primary(), None), None);
    let a = analyzer.analyze(query("meditation music")).await.unwrap();

    let ids: Vec<&str> = a.rising_star_channels.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["UCcalm"]);
    assert!(a.rising_star_channels[0].rising_star_score >= 60);
}

#[tokio::test]
async fn exhausted_providers_degrade_instead_of_failing() {
    let analyzer = common::analyzer(common::gateway(down_primary(), None), None);
    let a = analyzer.analyze(query("meditation music")).await.unwrap();

    assert_invariants(&a);
    assert_eq!(a.channels_analyzed, 0);
    assert!(a.rising_star_channels.is_empty());
    assert!(a.warnings[0].contains("all providers exhausted"));

    let b = &a.breakdown;
    assert_eq!(b.search_volume.provenance, Provenance::Estimated);
    assert_eq!(b.competition.provenance, Provenance::Estimated);
    assert_eq!(b.content_availability.provenance, Provenance::Estimated);
    assert_eq!(b.trend_momentum.provenance, Provenance::Estimated);
    // The keyword match still counts as live table data.
    assert_eq!(b.monetization.provenance, Provenance::Live);

    // Documented fallbacks: 10 + 5 recognized topic, 12, 7, 7.
    assert_eq!(b.search_volume.points, 15);
    assert_eq!(b.competition.points, 12);
    assert_eq!(b.content_availability.points, 7);
    assert_eq!(b.trend_momentum.points, 7);
}

#[tokio::test]
async fn fallbacks_are_deterministic() {
    let analyzer = common::analyzer(common::gateway(down_primary(), None), None);
    let a = analyzer.analyze(query("xyzzy12345nonsense")).await.unwrap();
    let b = analyzer.analyze(query("xyzzy12345nonsense")).await.unwrap();
    assert_eq!(a.total_score, b.total_score);
    assert_eq!(a.breakdown, b.breakdown);
    assert_eq!(a.monetization.category, "unknown");
    assert_eq!(a.breakdown.monetization.provenance, Provenance::Estimated);
}

#[tokio::test]
async fn bounds_hold_across_inputs() {
    let niches = [
        "personal finance",
        "asmr",
        "minecraft speedrun",
        "top 10 compilation",
        "xyzzy12345nonsense",
        "a",
    ];
    for interest in [None, Some(0.0), Some(55.5), Some(100.0)] {
        for live in [true, false] {
            let primary = if live { live_primary() } else { down_primary() };
            let analyzer = common::analyzer(common::gateway(primary, None), interest);
            for niche in niches {
                let q = query(niche).with_region("DE");
                let a = analyzer.analyze(q).await.unwrap();
                assert_invariants(&a);
            }
        }
    }
}

#[tokio::test]
async fn invalid_niche_is_rejected() {
    let analyzer = common::analyzer(common::gateway(live_primary(), None), None);
    let err = analyzer.analyze(query("   ")).await.unwrap_err();
    assert_eq!(err, ValidationError::Empty);

    let err = analyzer.analyze(query(&"x".repeat(200))).await.unwrap_err();
    assert!(matches!(err, ValidationError::TooLong { .. }));
}

#[tokio::test]
async fn discovery_sorts_by_rising_star_score() {
    let analyzer = common::analyzer(common::gateway(live_primary(), None), None);
    let channels = analyzer
        .discover_channels(query("meditation music"))
        .await
        .unwrap();

    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].id, "UCcalm");
    assert!(channels[0].rising_star_score >= channels[1].rising_star_score);
    assert!(channels[0].faceless_score > channels[1].faceless_score);
    assert_eq!(channels[0].url, "https://www.youtube.com/channel/UCcalm");
}

#[tokio::test]
async fn discovery_drops_only_unavailable_channels() {
    let primary = Arc::new(
        ScriptedPrimary::all(Behavior::Ok)
            .with_channels(vec![common::rising_meditation_channel()])
            .with_search_hit(ChannelSummary {
                id: "UCgone".into(),
                name: "Gone".into(),
                url: String::new(),
                subscribers: None,
                video_count: None,
                description: String::new(),
            }),
    );
    let analyzer = common::analyzer(common::gateway(primary, None), None);
    let channels = analyzer
        .discover_channels(query("meditation"))
        .await
        .unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].id, "UCcalm");
}

#[tokio::test]
async fn discovery_surfaces_exhaustion() {
    let analyzer = common::analyzer(common::gateway(down_primary(), None), None);
    let err = analyzer
        .discover_channels(query("meditation"))
        .await
        .unwrap_err();
    match err {
        DiscoveryError::Gateway(g) => assert_eq!(g.attempted().len(), 4),
        other => panic!("unexpected error: {other}"),
    }
}
