use std::time::Instant;

use serde::Serialize;
use tracing::debug;

/// Lifecycle of one analysis request. Moves strictly forward; there is no
/// retry of the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    QueryReceived,
    DataGathered,
    Scored,
    Returned,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::QueryReceived => Some(Stage::DataGathered),
            Stage::DataGathered => Some(Stage::Scored),
            Stage::Scored => Some(Stage::Returned),
            Stage::Returned => None,
        }
    }
}

/// Per-request stage tracker; transitions are traced with elapsed time.
#[derive(Debug)]
pub struct RequestStages {
    niche: String,
    stage: Stage,
    started: Instant,
}

impl RequestStages {
    pub fn start(niche: &str) -> Self {
        debug!(target: "scoring", niche, stage = ?Stage::QueryReceived, "stage");
        Self {
            niche: niche.to_string(),
            stage: Stage::QueryReceived,
            started: Instant::now(),
        }
    }

    pub fn current(&self) -> Stage {
        self.stage
    }

    /// Move to the next stage. Advancing past `Returned` is a no-op.
    pub fn advance(&mut self) -> Stage {
        if let Some(next) = self.stage.next() {
            self.stage = next;
            debug!(
                target: "scoring",
                niche = %self.niche,
                stage = ?next,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "stage"
            );
        }
        self.stage
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1_000.0
    }
}
