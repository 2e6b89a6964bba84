use serde::Serialize;

use crate::engine::two_decimals;
use crate::error::Result;
use crate::store::{KeySpace, StatsStore};
use crate::types::SaleEvent;

/// One point of a product's price series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSample {
    pub timestamp_ms: i64,
    pub price: f64,
}

/// Sorted-set member for a sample. The timestamp prefix keeps two different
/// prices sold in the same millisecond apart; an identical re-delivered sample
/// lands on the same member and does not grow the series.
fn sample_member(timestamp_ms: i64, price: f64) -> String {
    format!("{timestamp_ms}:{}", two_decimals(price))
}

fn parse_member(member: &str, score: f64) -> Option<PriceSample> {
    let (ts, price) = member.split_once(':')?;
    Some(PriceSample {
        timestamp_ms: ts.parse().unwrap_or(score as i64),
        price: price.parse().ok()?,
    })
}

/// Append the event's price to its (category, product) series, ordered by event
/// timestamp, then trim the series to its newest `limit` samples.
/// Returns how many old samples were evicted.
pub async fn record_price_sample(
    store: &dyn StatsStore,
    keys: &KeySpace,
    event: &SaleEvent,
    limit: usize,
) -> Result<usize> {
    let key = keys.price_history(&event.category, &event.product_id);
    store
        .zadd(&key, &sample_member(event.timestamp_ms, event.price), event.timestamp_ms as f64)
        .await?;
    // Keep ranks -limit..-1: remove 0..=-(limit+1).
    let stop = -1 - isize::try_from(limit).unwrap_or(isize::MAX);
    store.zremrange_by_rank(&key, 0, stop).await
}

/// Newest `limit` samples of a series, oldest first.
pub async fn recent_samples(
    store: &dyn StatsStore,
    keys: &KeySpace,
    category: &str,
    product_id: &str,
    limit: usize,
) -> Result<Vec<PriceSample>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let start = -isize::try_from(limit).unwrap_or(isize::MAX);
    let entries = store
        .zrange_with_scores(&keys.price_history(category, product_id), start, -1)
        .await?;
    Ok(entries
        .iter()
        .filter_map(|(member, score)| parse_member(member, *score))
        .collect())
}
