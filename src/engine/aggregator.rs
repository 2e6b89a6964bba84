use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::engine::{category, extremes, history, popularity};
use crate::error::{AppError, Result};
use crate::store::{KeySpace, StatsStore};
use crate::types::{AggregationReport, AggregationStep, SaleEvent, StreamMessage};

/// A statistic-critical step failed; every step after it was skipped for this event.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct StepFailure {
    pub step: AggregationStep,
    #[source]
    pub source: AppError,
}

impl StepFailure {
    fn at(step: AggregationStep) -> impl FnOnce(AppError) -> StepFailure {
        move |source| StepFailure { step, source }
    }
}

/// Runs the archive write and the per-event update routines against the store.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn StatsStore>,
    keys: KeySpace,
    history_limit: usize,
}

impl Aggregator {
    pub fn new(store: Arc<dyn StatsStore>, keys: KeySpace, history_limit: usize) -> Self {
        Self { store, keys, history_limit }
    }

    /// Write the payload verbatim under its `(topic, partition, offset)` key, no expiry.
    pub async fn archive(&self, msg: &StreamMessage) -> Result<()> {
        let key = self.keys.raw_event(&msg.topic, msg.partition, msg.offset);
        self.store.set(&key, &msg.payload).await
    }

    /// Apply one decoded sale to every derived statistic.
    ///
    /// Order is fixed: category totals, global extremes, global popularity,
    /// per-product price, category best product, price history. The first four
    /// plus the category resolver short-circuit on error. The history append runs
    /// last; its failure is handed back in the report for the caller to log.
    pub async fn aggregate(&self, event: &SaleEvent) -> std::result::Result<AggregationReport, StepFailure> {
        let store = self.store.as_ref();
        let keys = &self.keys;

        let totals = category::record_category_sale(store, keys, event)
            .await
            .map_err(StepFailure::at(AggregationStep::CategoryStats))?;

        let moved = extremes::update_extremes(store, keys, event.price)
            .await
            .map_err(StepFailure::at(AggregationStep::GlobalExtremes))?;
        if moved.raised_max || moved.lowered_min {
            debug!(
                price = event.price,
                raised_max = moved.raised_max,
                lowered_min = moved.lowered_min,
                "global price extremes moved"
            );
        }

        popularity::update_global_popularity(store, keys, event)
            .await
            .map_err(StepFailure::at(AggregationStep::GlobalPopularity))?;

        // The category resolver reads these totals, so they must land first.
        category::record_product_price(store, keys, event)
            .await
            .map_err(StepFailure::at(AggregationStep::ProductPrice))?;

        let category_best = popularity::resolve_category_best(store, keys, event)
            .await
            .map_err(StepFailure::at(AggregationStep::CategoryBest))?;

        let history_error = match history::record_price_sample(store, keys, event, self.history_limit).await {
            Ok(evicted) => {
                if evicted > 0 {
                    debug!(
                        category = %event.category,
                        product_id = %event.product_id,
                        evicted,
                        "price history trimmed"
                    );
                }
                None
            }
            Err(e) => Some(e.to_string()),
        };

        Ok(AggregationReport {
            category_count: totals.count,
            category_average: totals.average,
            category_best,
            history_error,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
