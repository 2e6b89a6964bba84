use crate::error::{AppError, Result};

pub const KAFKA_BROKERS: &str = "kafka:9092";
pub const KAFKA_TOPIC: &str = "ventas";
pub const KAFKA_GROUP: &str = "ventas-consumer";
pub const VALKEY_ADDR: &str = "valkey-primary:6379";

/// Category assigned to events that arrive without one.
pub const DEFAULT_CATEGORY: &str = "Unknown";

/// Product id assigned to events that arrive without one.
pub const DEFAULT_PRODUCT_ID: &str = "UNKNOWN";

/// Fixed sleep after a failed stream read (milliseconds).
pub const READ_BACKOFF_MS: u64 = 500;

/// Samples retained per (category, product) price series.
pub const PRICE_HISTORY_LIMIT: usize = 1000;

/// Emit an info-level progress line every this many messages.
pub const PROGRESS_LOG_EVERY: u64 = 500;

/// Which statistics store backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Valkey,
    /// Process-local store; statistics vanish on exit. Local runs only.
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "valkey" | "redis" => Ok(StoreKind::Valkey),
            "memory" => Ok(StoreKind::Memory),
            other => Err(AppError::Config(format!(
                "STATS_STORE must be 'valkey' or 'memory', got '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Valkey => write!(f, "valkey"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Comma-separated bootstrap servers (KAFKA_BROKERS)
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_group: String,
    /// Where a consumer group without committed offsets starts (KAFKA_OFFSET_RESET)
    pub kafka_offset_reset: String,
    /// Store address, `host:port` or a full `redis://` URL (VALKEY_ADDR)
    pub valkey_addr: String,
    pub store_kind: StoreKind,
    /// Optional namespace prepended to every key (STATS_KEY_PREFIX)
    pub key_prefix: Option<String>,
    pub read_backoff_ms: u64,
    pub price_history_limit: usize,
    pub api_port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            kafka_brokers: env_or("KAFKA_BROKERS", KAFKA_BROKERS),
            kafka_topic: env_or("KAFKA_TOPIC", KAFKA_TOPIC),
            kafka_group: env_or("KAFKA_GROUP", KAFKA_GROUP),
            kafka_offset_reset: env_or("KAFKA_OFFSET_RESET", "earliest"),
            valkey_addr: env_or("VALKEY_ADDR", VALKEY_ADDR),
            store_kind: env_or("STATS_STORE", "valkey").parse()?,
            key_prefix: std::env::var("STATS_KEY_PREFIX")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            read_backoff_ms: env_or("READ_BACKOFF_MS", &READ_BACKOFF_MS.to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("READ_BACKOFF_MS must be a whole number of milliseconds".to_string()))?,
            price_history_limit: env_or("PRICE_HISTORY_LIMIT", &PRICE_HISTORY_LIMIT.to_string())
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AppError::Config("PRICE_HISTORY_LIMIT must be a positive integer".to_string()))?,
            api_port: env_or("API_PORT", "3000")
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }

    /// Connection URL for the store, adding the `redis://` scheme to bare `host:port` values.
    pub fn valkey_url(&self) -> String {
        if self.valkey_addr.contains("://") {
            self.valkey_addr.clone()
        } else {
            format!("redis://{}", self.valkey_addr)
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_addr(addr: &str) -> Config {
        Config {
            kafka_brokers: KAFKA_BROKERS.to_string(),
            kafka_topic: KAFKA_TOPIC.to_string(),
            kafka_group: KAFKA_GROUP.to_string(),
            kafka_offset_reset: "earliest".to_string(),
            valkey_addr: addr.to_string(),
            store_kind: StoreKind::Valkey,
            key_prefix: None,
            read_backoff_ms: READ_BACKOFF_MS,
            price_history_limit: PRICE_HISTORY_LIMIT,
            api_port: 3000,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn bare_address_gets_redis_scheme() {
        assert_eq!(config_with_addr("valkey-primary:6379").valkey_url(), "redis://valkey-primary:6379");
    }

    #[test]
    fn full_url_is_kept() {
        assert_eq!(config_with_addr("rediss://cache:6380/2").valkey_url(), "rediss://cache:6380/2");
    }

    #[test]
    fn store_kind_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("redis".parse::<StoreKind>().unwrap(), StoreKind::Valkey);
        assert!("postgres".parse::<StoreKind>().is_err());
    }
}
