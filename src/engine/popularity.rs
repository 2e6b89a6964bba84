//! Popularity rankings: the global best/worst seller and, per category, the most
//! popular product together with its own average price.
//!
//! Ties: ascending rank orders equal scores by product id byte-wise, descending
//! rank is the exact reverse. On a tie the best seller is therefore the greatest
//! product id and the worst seller the smallest.

use tracing::debug;

use crate::engine::category::product_average;
use crate::engine::two_decimals;
use crate::error::Result;
use crate::store::{KeySpace, ScoredMember, StatsStore};
use crate::types::{CategoryBest, RankedProduct, SaleEvent};

/// Rank-0 entries of the global ranking after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct PopularityLeaders {
    pub best: Option<RankedProduct>,
    pub worst: Option<RankedProduct>,
}

fn first_ranked(entries: Vec<ScoredMember>) -> Option<RankedProduct> {
    entries
        .into_iter()
        .next()
        .map(|(product_id, quantity)| RankedProduct { product_id, quantity })
}

/// Add the sold quantity to the global ranking and republish best/worst seller.
/// Events that do not sell a positive quantity leave everything untouched (`None`).
pub async fn update_global_popularity(
    store: &dyn StatsStore,
    keys: &KeySpace,
    event: &SaleEvent,
) -> Result<Option<PopularityLeaders>> {
    if !event.moves_popularity() {
        return Ok(None);
    }

    let ranking = keys.product_popularity();
    store
        .zincr_by(&ranking, &event.product_id, f64::from(event.quantity_sold))
        .await?;

    let best = first_ranked(store.zrevrange_with_scores(&ranking, 0, 0).await?);
    if let Some(best) = &best {
        store.set(&keys.best_product(), best.to_string().as_bytes()).await?;
    }

    let worst = first_ranked(store.zrange_with_scores(&ranking, 0, 0).await?);
    if let Some(worst) = &worst {
        store.set(&keys.worst_product(), worst.to_string().as_bytes()).await?;
    }

    Ok(Some(PopularityLeaders { best, worst }))
}

/// Two-level lookup for one category: bump the product in the category ranking
/// (positive quantities only), then take the ranking's leader and publish it with
/// the leader's own running average price.
///
/// Runs on every event, so a zero-quantity sale still refreshes the record with
/// the latest average. Must run after the event's price reached the per-product
/// totals. Returns `None` when the ranking is empty or the leader has no price yet.
pub async fn resolve_category_best(
    store: &dyn StatsStore,
    keys: &KeySpace,
    event: &SaleEvent,
) -> Result<Option<CategoryBest>> {
    let category = event.category.as_str();
    let ranking = keys.category_popularity(category);

    if event.moves_popularity() {
        store
            .zincr_by(&ranking, &event.product_id, f64::from(event.quantity_sold))
            .await?;
    }

    let Some(leader) = first_ranked(store.zrevrange_with_scores(&ranking, 0, 0).await?) else {
        return Ok(None);
    };

    let Some(average_price) = product_average(store, keys, category, &leader.product_id).await? else {
        debug!(
            category,
            product_id = %leader.product_id,
            "category leader has no recorded price yet, best product left as is"
        );
        return Ok(None);
    };

    let best = CategoryBest {
        product_id: leader.product_id,
        average_price,
        quantity: leader.quantity,
    };
    store
        .hset(&keys.best_product_by_category(), category, &best.product_id)
        .await?;
    store
        .hset(&keys.best_average_price_by_category(), category, &two_decimals(best.average_price))
        .await?;
    store
        .hset(&keys.best_quantity_by_category(), category, &format!("{:.0}", best.quantity))
        .await?;

    Ok(Some(best))
}
