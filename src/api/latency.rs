//! Per-stage processing time of the ingest loop, in microseconds.
//! The raw archive write and the aggregation pipeline are tracked apart so a
//! slow store shows up against the stage that hit it.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// Ingest stages that talk to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Archive,
    Aggregate,
}

/// Percentiles of one stage. `None` until the stage saw a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageLatency {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

pub struct LatencyStats {
    archive: Mutex<Histogram<u64>>,
    aggregate: Mutex<Histogram<u64>>,
}

/// 1us to 100s, 3 significant figures.
fn stage_histogram() -> Mutex<Histogram<u64>> {
    Mutex::new(Histogram::new_with_bounds(1, 100_000_000, 3).expect("valid histogram bounds"))
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            archive: stage_histogram(),
            aggregate: stage_histogram(),
        }
    }

    fn histogram(&self, stage: Stage) -> &Mutex<Histogram<u64>> {
        match stage {
            Stage::Archive => &self.archive,
            Stage::Aggregate => &self.aggregate,
        }
    }

    pub fn record(&self, stage: Stage, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        if let Ok(mut h) = self.histogram(stage).lock() {
            h.saturating_record(us.max(1));
        }
    }

    pub fn stage(&self, stage: Stage) -> StageLatency {
        let Ok(h) = self.histogram(stage).lock() else {
            return StageLatency { samples: 0, p50_us: None, p95_us: None, p99_us: None };
        };
        let at = |q: f64| (h.len() > 0).then(|| h.value_at_quantile(q));
        StageLatency {
            samples: h.len(),
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
        }
    }
}
