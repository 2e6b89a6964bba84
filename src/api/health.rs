//! Shared health counters for the /health endpoint.
//! Updated by the ingestion loop, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use crate::types::Outcome;

pub struct HealthState {
    /// False after a failed read, true again once a read succeeds.
    stream_readable: AtomicBool,
    messages_read: AtomicU64,
    read_failures: AtomicU64,
    archive_failures: AtomicU64,
    malformed: AtomicU64,
    aggregation_failures: AtomicU64,
    aggregated: AtomicU64,
    history_failures: AtomicU64,
    /// Identity of the last message read (-1 = none yet).
    last_partition: AtomicI32,
    last_offset: AtomicI64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub stream_readable: bool,
    pub messages_read: u64,
    pub read_failures: u64,
    pub archive_failures: u64,
    pub malformed: u64,
    pub aggregation_failures: u64,
    pub aggregated: u64,
    pub history_failures: u64,
    pub last_partition: Option<i32>,
    pub last_offset: Option<i64>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            stream_readable: AtomicBool::new(false),
            messages_read: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            archive_failures: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            aggregation_failures: AtomicU64::new(0),
            aggregated: AtomicU64::new(0),
            history_failures: AtomicU64::new(0),
            last_partition: AtomicI32::new(-1),
            last_offset: AtomicI64::new(-1),
        }
    }

    /// A message was read; returns the total read so far.
    pub fn record_read(&self, partition: i32, offset: i64) -> u64 {
        self.stream_readable.store(true, Ordering::Relaxed);
        self.last_partition.store(partition, Ordering::Relaxed);
        self.last_offset.store(offset, Ordering::Relaxed);
        self.messages_read.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::ReadFailed => {
                self.stream_readable.store(false, Ordering::Relaxed);
                &self.read_failures
            }
            Outcome::ArchiveFailed => &self.archive_failures,
            Outcome::Malformed => &self.malformed,
            Outcome::AggregationFailed(_) => &self.aggregation_failures,
            Outcome::Aggregated => &self.aggregated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_history_failure(&self) {
        self.history_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last_partition = self.last_partition.load(Ordering::Relaxed);
        let last_offset = self.last_offset.load(Ordering::Relaxed);
        HealthSnapshot {
            stream_readable: self.stream_readable.load(Ordering::Relaxed),
            messages_read: self.messages_read.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            archive_failures: self.archive_failures.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            aggregation_failures: self.aggregation_failures.load(Ordering::Relaxed),
            aggregated: self.aggregated.load(Ordering::Relaxed),
            history_failures: self.history_failures.load(Ordering::Relaxed),
            last_partition: (last_partition >= 0).then_some(last_partition),
            last_offset: (last_offset >= 0).then_some(last_offset),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
