use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

use crate::error::Result;
use crate::store::backend::{ScoredMember, StatsStore};

/// Compare-and-set run server-side so two engine instances cannot interleave
/// between the read and the write. ARGV[1] is the candidate number, ARGV[2] the
/// text stored when it wins. A missing or non-numeric current value always loses.
const SET_IF_GREATER_LUA: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]))
if current == nil or tonumber(ARGV[1]) > current then
  redis.call('SET', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

const SET_IF_LESS_LUA: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]))
if current == nil or tonumber(ARGV[1]) < current then
  redis.call('SET', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

/// Statistics store backed by Valkey (or any Redis-protocol server).
///
/// `ConnectionManager` reconnects on its own; a failed command surfaces as a
/// store error for the event being processed and the next event retries the link.
#[derive(Clone)]
pub struct ValkeyStore {
    conn: ConnectionManager,
    set_if_greater: Script,
    set_if_less: Script,
}

impl ValkeyStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Valkey connected at {url}");
        Ok(Self {
            conn,
            set_if_greater: Script::new(SET_IF_GREATER_LUA),
            set_if_less: Script::new(SET_IF_LESS_LUA),
        })
    }

    async fn run_conditional_set(&self, script: &Script, key: &str, value: f64, formatted: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let changed: i64 = script
            .key(key)
            .arg(value.to_string())
            .arg(formatted)
            .invoke_async(&mut conn)
            .await?;
        Ok(changed == 1)
    }
}

#[async_trait]
impl StatsStore for ValkeyStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn hincr_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64> {
        // An f64 delta makes the client issue HINCRBYFLOAT.
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        Ok(conn.zincr(key, member, delta).await?)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<ScoredMember>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrange_withscores(key, start, stop).await?)
    }

    async fn zrevrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<ScoredMember>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrevrange_withscores(key, start, stop).await?)
    }

    async fn zremrange_by_rank(&self, key: &str, start: isize, stop: isize) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.zremrangebyrank(key, start, stop).await?)
    }

    async fn set_if_greater(&self, key: &str, value: f64, formatted: &str) -> Result<bool> {
        self.run_conditional_set(&self.set_if_greater, key, value, formatted).await
    }

    async fn set_if_less(&self, key: &str, value: f64, formatted: &str) -> Result<bool> {
        self.run_conditional_set(&self.set_if_less, key, value, formatted).await
    }

    fn backend_name(&self) -> &'static str {
        "valkey"
    }
}
