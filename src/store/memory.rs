use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
#[cfg(test)]
use dashmap::DashSet;

use crate::error::{AppError, Result};
use crate::store::backend::{ScoredMember, StatsStore};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Value {
    Str(Vec<u8>),
    Hash(HashMap<String, String>),
    ZSet(SortedSet),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::ZSet(_) => "zset",
        }
    }
}

/// member → score. Rank order is derived on read: score ascending, ties by member
/// byte-wise ascending, which is how Valkey orders equal scores.
#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
}

impl SortedSet {
    fn ascending(&self) -> Vec<ScoredMember> {
        let mut ranked: Vec<ScoredMember> = self
            .scores
            .iter()
            .map(|(member, score)| (member.clone(), *score))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

/// Resolves rank indices (negative = from the end) against `len` members.
/// Returns the inclusive window, or None when it selects nothing.
fn rank_window(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let mut stop = if stop < 0 { stop + len } else { stop };
    if start > stop || start >= len {
        return None;
    }
    if stop >= len {
        stop = len - 1;
    }
    Some((start as usize, stop as usize))
}

fn slice_window(ranked: Vec<ScoredMember>, start: isize, stop: isize) -> Vec<ScoredMember> {
    match rank_window(ranked.len(), start, stop) {
        Some((from, to)) => ranked.into_iter().skip(from).take(to - from + 1).collect(),
        None => Vec::new(),
    }
}

fn parse_number(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw).ok()?.trim().parse::<f64>().ok()
}

fn wrong_type(cmd: &str, key: &str, found: &Value) -> AppError {
    AppError::Store(format!(
        "WRONGTYPE {cmd} against key '{key}' holding a {}",
        found.type_name()
    ))
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local statistics store with the same per-key atomicity and ordering
/// as Valkey. Each operation holds the key's shard lock for its whole
/// read-modify-write, so concurrent callers never interleave on one key.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
    /// Commands that fail on purpose.
    #[cfg(test)]
    failing: DashSet<&'static str>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Make every later call of `cmd` (e.g. `"HINCRBYFLOAT"`) return a store error.
    #[cfg(test)]
    pub fn fail_command(&self, cmd: &'static str) {
        self.failing.insert(cmd);
    }

    #[cfg(test)]
    pub fn heal_command(&self, cmd: &'static str) {
        self.failing.remove(cmd);
    }

    fn check(&self, cmd: &'static str) -> Result<()> {
        #[cfg(test)]
        if self.failing.contains(cmd) {
            return Err(AppError::Store(format!("injected failure on {cmd}")));
        }
        let _ = cmd;
        Ok(())
    }

    fn with_hash<T>(
        &self,
        cmd: &'static str,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, String>) -> Result<T>,
    ) -> Result<T> {
        self.check(cmd)?;
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        match &mut *entry {
            Value::Hash(hash) => f(hash),
            other => Err(wrong_type(cmd, key, other)),
        }
    }

    fn with_zset<T>(
        &self,
        cmd: &'static str,
        key: &str,
        f: impl FnOnce(&mut SortedSet) -> T,
    ) -> Result<T> {
        self.check(cmd)?;
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::ZSet(SortedSet::default()));
        match &mut *entry {
            Value::ZSet(zset) => Ok(f(zset)),
            other => Err(wrong_type(cmd, key, other)),
        }
    }

    fn read_zset(&self, cmd: &'static str, key: &str) -> Result<Vec<ScoredMember>> {
        self.check(cmd)?;
        match self.entries.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match &*entry {
                Value::ZSet(zset) => Ok(zset.ascending()),
                other => Err(wrong_type(cmd, key, other)),
            },
        }
    }

    fn set_if(
        &self,
        cmd: &'static str,
        key: &str,
        formatted: &str,
        beats: impl FnOnce(f64) -> bool,
    ) -> Result<bool> {
        self.check(cmd)?;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = match occupied.get() {
                    Value::Str(raw) => parse_number(raw),
                    other => return Err(wrong_type(cmd, key, other)),
                };
                if current.map_or(true, beats) {
                    *occupied.get_mut() = Value::Str(formatted.as_bytes().to_vec());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Value::Str(formatted.as_bytes().to_vec()));
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check("SET")?;
        self.entries.insert(key.to_string(), Value::Str(value.to_vec()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check("GET")?;
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) => match &*entry {
                Value::Str(raw) => Ok(Some(raw.clone())),
                other => Err(wrong_type("GET", key, other)),
            },
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.with_hash("HSET", key, |hash| {
            hash.insert(field.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.check("HGET")?;
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) => match &*entry {
                Value::Hash(hash) => Ok(hash.get(field).cloned()),
                other => Err(wrong_type("HGET", key, other)),
            },
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.check("HGETALL")?;
        match self.entries.get(key) {
            None => Ok(HashMap::new()),
            Some(entry) => match &*entry {
                Value::Hash(hash) => Ok(hash.clone()),
                other => Err(wrong_type("HGETALL", key, other)),
            },
        }
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.with_hash("HINCRBY", key, |hash| {
            let current = match hash.get(field) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|_| AppError::Store(format!("hash value of '{key}'/'{field}' is not an integer")))?,
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| AppError::Store(format!("increment would overflow '{key}'/'{field}'")))?;
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn hincr_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64> {
        self.with_hash("HINCRBYFLOAT", key, |hash| {
            let current = match hash.get(field) {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|_| AppError::Store(format!("hash value of '{key}'/'{field}' is not a float")))?,
                None => 0.0,
            };
            let next = current + delta;
            if !next.is_finite() {
                return Err(AppError::Store(format!("increment would produce NaN or Infinity at '{key}'/'{field}'")));
            }
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.with_zset("ZINCRBY", key, |zset| {
            let score = zset.scores.entry(member.to_string()).or_insert(0.0);
            *score += delta;
            *score
        })
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.with_zset("ZADD", key, |zset| {
            zset.scores.insert(member.to_string(), score);
        })
    }

    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<ScoredMember>> {
        let ranked = self.read_zset("ZRANGE", key)?;
        Ok(slice_window(ranked, start, stop))
    }

    async fn zrevrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<ScoredMember>> {
        let mut ranked = self.read_zset("ZREVRANGE", key)?;
        ranked.reverse();
        Ok(slice_window(ranked, start, stop))
    }

    async fn zremrange_by_rank(&self, key: &str, start: isize, stop: isize) -> Result<usize> {
        self.check("ZREMRANGEBYRANK")?;
        let removed = match self.entries.get_mut(key) {
            None => return Ok(0),
            Some(mut entry) => match &mut *entry {
                Value::ZSet(zset) => {
                    let doomed = slice_window(zset.ascending(), start, stop);
                    for (member, _) in &doomed {
                        zset.scores.remove(member);
                    }
                    doomed.len()
                }
                other => return Err(wrong_type("ZREMRANGEBYRANK", key, other)),
            },
        };
        // Valkey drops keys whose sorted set became empty.
        self.entries
            .remove_if(key, |_, value| matches!(value, Value::ZSet(z) if z.scores.is_empty()));
        Ok(removed)
    }

    async fn set_if_greater(&self, key: &str, value: f64, formatted: &str) -> Result<bool> {
        self.set_if("SETIFGREATER", key, formatted, |current| value > current)
    }

    async fn set_if_less(&self, key: &str, value: f64, formatted: &str) -> Result<bool> {
        self.set_if("SETIFLESS", key, formatted, |current| value < current)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ranked: &[ScoredMember]) -> Vec<&str> {
        ranked.iter().map(|(m, _)| m.as_str()).collect()
    }

    #[test]
    fn rank_window_resolves_negative_indices() {
        assert_eq!(rank_window(5, 0, -1), Some((0, 4)));
        assert_eq!(rank_window(5, 0, 0), Some((0, 0)));
        assert_eq!(rank_window(5, -2, -1), Some((3, 4)));
        assert_eq!(rank_window(5, 0, 99), Some((0, 4)));
        assert_eq!(rank_window(5, 0, -6), None);
        assert_eq!(rank_window(0, 0, 0), None);
        // Trim-to-last-3 on 5 members removes ranks 0..=1.
        assert_eq!(rank_window(5, 0, -4), Some((0, 1)));
    }

    #[tokio::test]
    async fn equal_scores_order_by_member_and_reverse_exactly() {
        let store = MemoryStore::new();
        store.zincr_by("z", "B", 5.0).await.unwrap();
        store.zincr_by("z", "C", 5.0).await.unwrap();
        store.zincr_by("z", "A", 5.0).await.unwrap();
        store.zincr_by("z", "D", 1.0).await.unwrap();

        let asc = store.zrange_with_scores("z", 0, -1).await.unwrap();
        assert_eq!(members(&asc), vec!["D", "A", "B", "C"]);

        let desc = store.zrevrange_with_scores("z", 0, -1).await.unwrap();
        assert_eq!(members(&desc), vec!["C", "B", "A", "D"]);
    }

    #[tokio::test]
    async fn zincr_accumulates_and_returns_new_score() {
        let store = MemoryStore::new();
        assert_eq!(store.zincr_by("z", "A", 3.0).await.unwrap(), 3.0);
        assert_eq!(store.zincr_by("z", "A", 4.0).await.unwrap(), 7.0);
        let top = store.zrevrange_with_scores("z", 0, 0).await.unwrap();
        assert_eq!(top, vec![("A".to_string(), 7.0)]);
    }

    #[tokio::test]
    async fn zremrange_keeps_highest_ranks_and_drops_empty_sets() {
        let store = MemoryStore::new();
        for ts in 1..=5 {
            store.zadd("h", &format!("m{ts}"), ts as f64).await.unwrap();
        }
        let removed = store.zremrange_by_rank("h", 0, -4).await.unwrap();
        assert_eq!(removed, 2);
        let left = store.zrange_with_scores("h", 0, -1).await.unwrap();
        assert_eq!(members(&left), vec!["m3", "m4", "m5"]);

        store.zremrange_by_rank("h", 0, -1).await.unwrap();
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn hash_increments_are_typed() {
        let store = MemoryStore::new();
        assert_eq!(store.hincr_by("c", "Home", 1).await.unwrap(), 1);
        assert_eq!(store.hincr_by("c", "Home", 1).await.unwrap(), 2);
        assert!((store.hincr_by_float("s", "Home", 2.5).await.unwrap() - 2.5).abs() < 1e-9);
        assert!((store.hincr_by_float("s", "Home", 0.25).await.unwrap() - 2.75).abs() < 1e-9);

        // A float-valued field refuses an integer increment.
        assert!(store.hincr_by("s", "Home", 1).await.is_err());
    }

    #[tokio::test]
    async fn wrong_type_is_an_error() {
        let store = MemoryStore::new();
        store.set("k", b"v").await.unwrap();
        assert!(store.hset("k", "f", "1").await.is_err());
        assert!(store.zincr_by("k", "m", 1.0).await.is_err());
        assert!(store.hget("k", "f").await.is_err());
    }

    #[tokio::test]
    async fn conditional_sets_treat_absent_as_unbounded() {
        let store = MemoryStore::new();
        assert!(store.set_if_greater("max", 5.0, "5.00").await.unwrap());
        assert!(!store.set_if_greater("max", 3.0, "3.00").await.unwrap());
        assert!(!store.set_if_greater("max", 5.0, "5.00").await.unwrap());
        assert!(store.set_if_greater("max", 8.0, "8.00").await.unwrap());
        assert_eq!(store.get("max").await.unwrap().unwrap(), b"8.00".to_vec());

        assert!(store.set_if_less("min", 5.0, "5.00").await.unwrap());
        assert!(store.set_if_less("min", 3.0, "3.00").await.unwrap());
        assert!(!store.set_if_less("min", 8.0, "8.00").await.unwrap());
        assert_eq!(store.get("min").await.unwrap().unwrap(), b"3.00".to_vec());
    }

    #[tokio::test]
    async fn unparsable_extreme_is_overwritten() {
        let store = MemoryStore::new();
        store.set("max", b"garbage").await.unwrap();
        assert!(store.set_if_greater("max", 1.0, "1.00").await.unwrap());
        assert_eq!(store.get("max").await.unwrap().unwrap(), b"1.00".to_vec());
    }

    #[tokio::test]
    async fn injected_failures_hit_only_the_named_command() {
        let store = MemoryStore::new();
        store.fail_command("HINCRBY");
        assert!(store.hincr_by("c", "Home", 1).await.is_err());
        assert!(store.hincr_by_float("s", "Home", 1.0).await.is_ok());
        store.heal_command("HINCRBY");
        assert_eq!(store.hincr_by("c", "Home", 1).await.unwrap(), 1);
    }
}
