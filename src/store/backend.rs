//! Statistics store contract.
//!
//! Every operation is a single-key atomic primitive on the backing store. The
//! engine keeps no state between events, so all cross-instance consistency
//! rests on these operations being atomic individually.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// `(member, score)` as returned by the ranged sorted-set reads.
pub type ScoredMember = (String, f64);

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// SET: unconditional, no expiry.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// GET: `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// HSET of a single field.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// HGET: `None` when the hash or the field is absent.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// HGETALL: empty map when the hash is absent.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// HINCRBY: returns the new value.
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// HINCRBYFLOAT: returns the new value.
    async fn hincr_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64>;

    /// ZINCRBY: returns the member's new score.
    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// ZADD of a single member, overwriting its score if present.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// ZRANGE WITHSCORES by rank, ascending. Equal scores order by member, byte-wise ascending.
    /// Negative indices count from the end.
    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<ScoredMember>>;

    /// ZREVRANGE WITHSCORES by rank: the exact reverse of the ascending order.
    async fn zrevrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<ScoredMember>>;

    /// ZREMRANGEBYRANK: returns how many members were removed.
    async fn zremrange_by_rank(&self, key: &str, start: isize, stop: isize) -> Result<usize>;

    /// Store `formatted` under `key` if `value` is strictly greater than the number
    /// currently held there. Absent or unparsable current values count as -inf.
    /// Compare and write happen as one atomic step on the store.
    async fn set_if_greater(&self, key: &str, value: f64, formatted: &str) -> Result<bool>;

    /// Mirror of [`StatsStore::set_if_greater`]; absent counts as +inf.
    async fn set_if_less(&self, key: &str, value: f64, formatted: &str) -> Result<bool>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
