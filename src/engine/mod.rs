//! Per-event aggregation: every routine reads and writes the statistics store
//! directly and keeps nothing in process between events.

pub mod aggregator;
pub mod category;
pub mod extremes;
pub mod history;
pub mod popularity;

pub use aggregator::{Aggregator, StepFailure};

/// Prices are persisted with two decimals wherever they are shown as text.
pub(crate) fn two_decimals(value: f64) -> String {
    format!("{value:.2}")
}
