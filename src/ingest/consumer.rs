use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::{LatencyStats, Stage};
use crate::config::PROGRESS_LOG_EVERY;
use crate::engine::Aggregator;
use crate::stream::{decode_sale, StreamSource};
use crate::types::{AggregationStep, Outcome, StreamMessage};

/// Single-consumer loop: read one message, archive it, decode it, aggregate it.
/// Every failure is contained to the message that caused it.
pub struct IngestLoop<S: StreamSource> {
    source: S,
    aggregator: Aggregator,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    read_backoff: Duration,
}

impl<S: StreamSource> IngestLoop<S> {
    pub fn new(
        source: S,
        aggregator: Aggregator,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
        read_backoff: Duration,
    ) -> Self {
        Self {
            source,
            aggregator,
            health,
            latency,
            read_backoff,
        }
    }

    /// Never returns. A failed read is followed by a pause before the next attempt.
    pub async fn run(mut self) {
        info!("Consuming sales from {}", self.source.describe());
        loop {
            if self.poll_once().await == Outcome::ReadFailed {
                tokio::time::sleep(self.read_backoff).await;
            }
        }
    }

    /// One full iteration for a single message.
    pub async fn poll_once(&mut self) -> Outcome {
        let outcome = match self.source.next_message().await {
            Ok(msg) => {
                let total = self.health.record_read(msg.partition, msg.offset);
                if total % PROGRESS_LOG_EVERY == 0 {
                    let snap = self.health.snapshot();
                    info!(
                        messages_read = total,
                        aggregated = snap.aggregated,
                        malformed = snap.malformed,
                        archive_failures = snap.archive_failures,
                        aggregation_failures = snap.aggregation_failures,
                        read_failures = snap.read_failures,
                        partition = msg.partition,
                        offset = msg.offset,
                        "ingest progress"
                    );
                }
                self.process(&msg).await
            }
            Err(e) => {
                error!("Stream read failed: {e}");
                Outcome::ReadFailed
            }
        };
        self.health.record_outcome(outcome);
        outcome
    }

    async fn process(&self, msg: &StreamMessage) -> Outcome {
        let started = Instant::now();
        let archived = self.aggregator.archive(msg).await;
        self.latency.record(Stage::Archive, started.elapsed());
        if let Err(e) = archived {
            error!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                "raw event archive failed: {e}"
            );
            return Outcome::ArchiveFailed;
        }

        let fallback_ts = msg.timestamp_ms.unwrap_or_else(now_ms);
        let event = match decode_sale(&msg.payload, fallback_ts) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    partition = msg.partition,
                    offset = msg.offset,
                    bytes = msg.payload.len(),
                    "discarding malformed sale: {e}"
                );
                return Outcome::Malformed;
            }
        };

        let started = Instant::now();
        match self.aggregator.aggregate(&event).await {
            Ok(report) => {
                self.latency.record(Stage::Aggregate, started.elapsed());
                if let Some(e) = &report.history_error {
                    self.health.record_history_failure();
                    warn!(
                        category = %event.category,
                        product_id = %event.product_id,
                        step = %AggregationStep::PriceHistory,
                        topic = %msg.topic,
                        partition = msg.partition,
                        offset = msg.offset,
                        "price history append failed: {e}"
                    );
                }
                debug!(
                    category = %event.category,
                    product_id = %event.product_id,
                    category_count = report.category_count,
                    category_average = report.category_average,
                    "sale aggregated"
                );
                Outcome::Aggregated
            }
            Err(failure) => {
                error!(
                    category = %event.category,
                    product_id = %event.product_id,
                    step = %failure.step,
                    partition = msg.partition,
                    offset = msg.offset,
                    "aggregation aborted: {}",
                    failure.source
                );
                Outcome::AggregationFailed(failure.step)
            }
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRICE_HISTORY_LIMIT;
    use crate::error::AppError;
    use crate::store::{KeySpace, MemoryStore, StatsStore};
    use crate::stream::source::testing::{message, ChannelSource};

    const SALE: &[u8] = br#"{"category":"Home","productId":"LAMP","price":25.5,"quantitySold":2}"#;

    struct Harness {
        store: Arc<MemoryStore>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
        keys: KeySpace,
    }

    fn ingest() -> (
        tokio::sync::mpsc::UnboundedSender<crate::error::Result<StreamMessage>>,
        IngestLoop<ChannelSource>,
        Harness,
    ) {
        let store = MemoryStore::new();
        let keys = KeySpace::default();
        let health = Arc::new(HealthState::new());
        let latency = Arc::new(LatencyStats::new());
        let aggregator = Aggregator::new(store.clone(), keys.clone(), PRICE_HISTORY_LIMIT);
        let (tx, source) = ChannelSource::new();
        let lp = IngestLoop::new(
            source,
            aggregator,
            health.clone(),
            latency.clone(),
            Duration::from_millis(5),
        );
        (tx, lp, Harness { store, health, latency, keys })
    }

    #[tokio::test]
    async fn valid_message_is_archived_and_aggregated() {
        let (tx, mut lp, h) = ingest();
        tx.send(Ok(message(0, 12, SALE))).unwrap();

        assert_eq!(lp.poll_once().await, Outcome::Aggregated);
        assert_eq!(
            h.store.get(&h.keys.raw_event("ventas", 0, 12)).await.unwrap().as_deref(),
            Some(SALE)
        );
        assert_eq!(h.store.hget(&h.keys.count(), "Home").await.unwrap().as_deref(), Some("1"));
        assert_eq!(h.latency.stage(Stage::Archive).samples, 1);
        assert_eq!(h.latency.stage(Stage::Aggregate).samples, 1);

        let snap = h.health.snapshot();
        assert_eq!(snap.aggregated, 1);
        assert_eq!(snap.last_offset, Some(12));
    }

    #[tokio::test]
    async fn rpc_service_payload_is_counted_under_its_category() {
        let (tx, mut lp, h) = ingest();
        let payload = br#"{"categoria":"Hogar","productoId":"LAMP-1","precio":25.5,"cantidadVendida":3,"timestampUnixMs":1700000000123}"#;
        tx.send(Ok(message(0, 20, payload))).unwrap();

        assert_eq!(lp.poll_once().await, Outcome::Aggregated);
        assert_eq!(h.store.hget(&h.keys.count(), "Hogar").await.unwrap().as_deref(), Some("1"));
        assert!(h.store.hget(&h.keys.count(), "Unknown").await.unwrap().is_none());
        assert_eq!(
            h.store.get(&h.keys.min_price()).await.unwrap().as_deref(),
            Some(&b"25.50"[..])
        );
        assert_eq!(
            h.store
                .hget(&h.keys.best_product_by_category(), "Hogar")
                .await
                .unwrap()
                .as_deref(),
            Some("LAMP-1")
        );
        let series = h
            .store
            .zrange_with_scores(&h.keys.price_history("Hogar", "LAMP-1"), 0, -1)
            .await
            .unwrap();
        assert_eq!(series, vec![("1700000000123:25.50".to_string(), 1_700_000_000_123.0)]);
    }

    #[tokio::test]
    async fn malformed_payload_is_archived_without_touching_stats() {
        let (tx, mut lp, h) = ingest();
        tx.send(Ok(message(2, 40, b"{not json"))).unwrap();

        assert_eq!(lp.poll_once().await, Outcome::Malformed);
        assert_eq!(
            h.store.get(&h.keys.raw_event("ventas", 2, 40)).await.unwrap().as_deref(),
            Some(&b"{not json"[..])
        );
        // The archive entry is the only key written.
        assert_eq!(h.store.key_count(), 1);
        assert_eq!(h.latency.stage(Stage::Archive).samples, 1);
        assert_eq!(h.latency.stage(Stage::Aggregate).samples, 0);
        assert_eq!(h.health.snapshot().malformed, 1);
    }

    #[tokio::test]
    async fn archive_failure_skips_the_message() {
        let (tx, mut lp, h) = ingest();
        h.store.fail_command("SET");
        tx.send(Ok(message(0, 1, SALE))).unwrap();

        assert_eq!(lp.poll_once().await, Outcome::ArchiveFailed);
        assert_eq!(h.store.key_count(), 0);

        // The next message goes through once the store recovers.
        h.store.heal_command("SET");
        tx.send(Ok(message(0, 2, SALE))).unwrap();
        assert_eq!(lp.poll_once().await, Outcome::Aggregated);
        assert!(h.store.get(&h.keys.raw_event("ventas", 0, 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_failure_does_not_stop_the_next_read() {
        let (tx, mut lp, h) = ingest();
        tx.send(Err(AppError::Stream("broker unreachable".to_string()))).unwrap();
        tx.send(Ok(message(0, 3, SALE))).unwrap();

        assert_eq!(lp.poll_once().await, Outcome::ReadFailed);
        assert!(!h.health.snapshot().stream_readable);
        assert_eq!(lp.poll_once().await, Outcome::Aggregated);

        let snap = h.health.snapshot();
        assert!(snap.stream_readable);
        assert_eq!(snap.read_failures, 1);
        assert_eq!(snap.messages_read, 1);
    }

    #[tokio::test]
    async fn aggregation_failure_is_reported_with_its_step() {
        let (tx, mut lp, h) = ingest();
        h.store.fail_command("ZINCRBY");
        tx.send(Ok(message(0, 5, SALE))).unwrap();

        assert_eq!(
            lp.poll_once().await,
            Outcome::AggregationFailed(AggregationStep::GlobalPopularity)
        );
        // Archived before the failure, and not retried.
        assert!(h.store.get(&h.keys.raw_event("ventas", 0, 5)).await.unwrap().is_some());
        assert_eq!(h.health.snapshot().aggregation_failures, 1);
    }

    #[tokio::test]
    async fn history_failure_is_counted_but_aggregated() {
        let (tx, mut lp, h) = ingest();
        h.store.fail_command("ZADD");
        tx.send(Ok(message(0, 6, SALE))).unwrap();

        assert_eq!(lp.poll_once().await, Outcome::Aggregated);
        assert_eq!(h.health.snapshot().history_failures, 1);
    }

    #[tokio::test]
    async fn missing_timestamp_uses_broker_time() {
        let (tx, mut lp, h) = ingest();
        tx.send(Ok(message(0, 9, SALE))).unwrap();
        lp.poll_once().await;

        let series = h
            .store
            .zrange_with_scores(&h.keys.price_history("Home", "LAMP"), 0, -1)
            .await
            .unwrap();
        assert_eq!(series, vec![("1700000000009:25.50".to_string(), 1_700_000_000_009.0)]);
    }

    #[tokio::test]
    async fn run_keeps_going_after_read_errors() {
        let (tx, lp, h) = ingest();
        tx.send(Err(AppError::Stream("timeout".to_string()))).unwrap();
        tx.send(Ok(message(1, 0, SALE))).unwrap();
        tx.send(Ok(message(1, 1, SALE))).unwrap();

        let handle = tokio::spawn(lp.run());
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.health.snapshot().aggregated < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.abort();

        let snap = h.health.snapshot();
        assert_eq!(snap.aggregated, 2);
        assert_eq!(snap.last_partition, Some(1));
        assert_eq!(h.store.hget(&h.keys.count(), "Home").await.unwrap().as_deref(), Some("2"));
    }
}
