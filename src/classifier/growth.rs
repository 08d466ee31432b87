//! Rising-star growth estimate for a single channel.
//!
//! Three components, each scored in points:
//! - view velocity: mean views of videos from the last 30 days vs. videos
//!   60–180 days old (max 40)
//! - upload acceleration: uploads in the last 30 days vs. the 30–60 day
//!   window (max 30)
//! - views per subscriber: mean video views ÷ subscribers (max 30)
//!
//! A component without enough data gets its neutral midpoint and is marked
//! `insufficient_data` instead of silently reading as zero growth.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ChannelRecord, Provenance, VideoRecord};

pub const VELOCITY_MAX: u32 = 40;
pub const ACCELERATION_MAX: u32 = 30;
pub const VIEWS_PER_SUB_MAX: u32 = 30;

const RECENT_DAYS: (i64, i64) = (0, 30);
const PRIOR_DAYS: (i64, i64) = (30, 60);
const OLD_DAYS: (i64, i64) = (60, 180);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthComponent {
    pub name: &'static str,
    /// Raw ratio behind the points; `None` when it could not be computed.
    pub value: Option<f64>,
    pub points: u32,
    pub max_points: u32,
    pub provenance: Provenance,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthEstimate {
    /// 0–100.
    pub rising_star_score: u32,
    pub view_velocity: GrowthComponent,
    pub upload_acceleration: GrowthComponent,
    pub views_per_subscriber: GrowthComponent,
    /// `InsufficientData` if any component fell back to its midpoint.
    pub provenance: Provenance,
}

fn age_days(v: &VideoRecord, as_of: DateTime<Utc>) -> Option<i64> {
    v.published_at.map(|p| (as_of - p).num_days())
}

fn in_window<'a>(
    record: &'a ChannelRecord,
    as_of: DateTime<Utc>,
    (lo, hi): (i64, i64),
) -> impl Iterator<Item = &'a VideoRecord> + 'a {
    record.videos.iter().filter(move |v| match age_days(v, as_of) {
        Some(d) => d >= lo && d < hi,
        None => false,
    })
}

fn mean_views<'a>(videos: impl Iterator<Item = &'a VideoRecord>) -> Option<f64> {
    let (sum, n) = videos.fold((0u64, 0u64), |(s, n), v| (s + v.views, n + 1));
    (n > 0).then(|| sum as f64 / n as f64)
}

fn step_points(value: f64, steps: &[(f64, u32)]) -> u32 {
    steps
        .iter()
        .find(|(min, _)| value >= *min)
        .map(|(_, p)| *p)
        .unwrap_or(0)
}

fn neutral(name: &'static str, max_points: u32, note: &str) -> GrowthComponent {
    GrowthComponent {
        name,
        value: None,
        points: max_points / 2,
        max_points,
        provenance: Provenance::InsufficientData,
        note: note.to_string(),
    }
}

fn view_velocity(record: &ChannelRecord, as_of: DateTime<Utc>) -> GrowthComponent {
    let recent = mean_views(in_window(record, as_of, RECENT_DAYS));
    let old = mean_views(in_window(record, as_of, OLD_DAYS));
    match (recent, old) {
        (Some(r), Some(o)) if o > 0.0 => {
            let ratio = r / o;
            GrowthComponent {
                name: "view_velocity",
                value: Some(ratio),
                points: step_points(
                    ratio,
                    &[(2.0, 40), (1.5, 30), (1.0, 20), (0.5, 10)],
                ),
                max_points: VELOCITY_MAX,
                provenance: Provenance::Live,
                note: format!("recent videos average {ratio:.2}x the views of older ones"),
            }
        }
        _ => neutral(
            "view_velocity",
            VELOCITY_MAX,
            "not enough dated videos in both the recent and older windows",
        ),
    }
}

fn upload_acceleration(record: &ChannelRecord, as_of: DateTime<Utc>) -> GrowthComponent {
    let recent = in_window(record, as_of, RECENT_DAYS).count();
    let prior = in_window(record, as_of, PRIOR_DAYS).count();
    if recent == 0 || prior == 0 {
        return neutral(
            "upload_acceleration",
            ACCELERATION_MAX,
            "no uploads in one of the two 30-day windows",
        );
    }
    let ratio = recent as f64 / prior as f64;
    GrowthComponent {
        name: "upload_acceleration",
        value: Some(ratio),
        points: step_points(ratio, &[(2.0, 30), (1.2, 22), (0.8, 15), (0.5, 8)]),
        max_points: ACCELERATION_MAX,
        provenance: Provenance::Live,
        note: format!("{recent} uploads in the last 30 days vs {prior} in the 30 before"),
    }
}

fn views_per_subscriber(record: &ChannelRecord) -> GrowthComponent {
    let mean = mean_views(record.videos.iter());
    match mean {
        Some(m) if record.subscribers > 0 => {
            let ratio = m / record.subscribers as f64;
            GrowthComponent {
                name: "views_per_subscriber",
                value: Some(ratio),
                points: step_points(ratio, &[(1.0, 30), (0.5, 22), (0.2, 15), (0.05, 8)]),
                max_points: VIEWS_PER_SUB_MAX,
                provenance: Provenance::Live,
                note: format!("videos average {ratio:.2} views per subscriber"),
            }
        }
        _ => neutral(
            "views_per_subscriber",
            VIEWS_PER_SUB_MAX,
            "subscriber count or video views unavailable",
        ),
    }
}

/// Score a channel's momentum. Pure: same record and `as_of` give the same result.
pub fn estimate_growth(record: &ChannelRecord, as_of: DateTime<Utc>) -> GrowthEstimate {
    let view_velocity = view_velocity(record, as_of);
    let upload_acceleration = upload_acceleration(record, as_of);
    let views_per_subscriber = views_per_subscriber(record);

    let parts = [&view_velocity, &upload_acceleration, &views_per_subscriber];
    let rising_star_score = parts.iter().map(|c| c.points).sum::<u32>().min(100);
    let provenance = if parts
        .iter()
        .any(|c| c.provenance == Provenance::InsufficientData)
    {
        Provenance::InsufficientData
    } else {
        Provenance::Live
    };

    GrowthEstimate {
        rising_star_score,
        view_velocity,
        upload_acceleration,
        views_per_subscriber,
        provenance,
    }
}
