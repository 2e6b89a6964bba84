use crate::error::{AppError, Result};
use crate::store::{KeySpace, StatsStore};
use crate::types::SaleEvent;

/// Category totals right after an event was folded in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryTotals {
    pub reports: i64,
    pub sum: f64,
    pub count: i64,
    pub average: f64,
}

/// Fold one sale into its category's report count, running sum, count and average.
///
/// Sum and count are two separate atomic increments, not a transaction. The average
/// is always re-derived from the values those increments returned.
pub async fn record_category_sale(store: &dyn StatsStore, keys: &KeySpace, event: &SaleEvent) -> Result<CategoryTotals> {
    let category = event.category.as_str();

    let reports = store.hincr_by(&keys.reports_by_category(), category, 1).await?;
    let sum = store.hincr_by_float(&keys.sum_price(), category, event.price).await?;
    let count = store.hincr_by(&keys.count(), category, 1).await?;
    let average = sum / count as f64;
    store.hset(&keys.category_average(), category, &average.to_string()).await?;

    Ok(CategoryTotals { reports, sum, count, average })
}

/// Fold one sale into the running sum/count of its product within the category.
/// Returns the product's new `(sum, count)`.
pub async fn record_product_price(store: &dyn StatsStore, keys: &KeySpace, event: &SaleEvent) -> Result<(f64, i64)> {
    let category = event.category.as_str();
    let sum = store
        .hincr_by_float(&keys.product_sum_price(category), &event.product_id, event.price)
        .await?;
    let count = store
        .hincr_by(&keys.product_count(category), &event.product_id, 1)
        .await?;
    Ok((sum, count))
}

/// Running average price of `product_id` within `category`.
/// `None` when no price was recorded yet (or the count is not positive).
pub async fn product_average(
    store: &dyn StatsStore,
    keys: &KeySpace,
    category: &str,
    product_id: &str,
) -> Result<Option<f64>> {
    let Some(sum) = store.hget(&keys.product_sum_price(category), product_id).await? else {
        return Ok(None);
    };
    let Some(count) = store.hget(&keys.product_count(category), product_id).await? else {
        return Ok(None);
    };
    let sum = parse_stored::<f64>(&sum, category, product_id)?;
    let count = parse_stored::<f64>(&count, category, product_id)?;
    if count <= 0.0 {
        return Ok(None);
    }
    Ok(Some(sum / count))
}

fn parse_stored<T: std::str::FromStr>(raw: &str, category: &str, product_id: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        AppError::Store(format!(
            "unparsable stored value '{raw}' for product {product_id} in category {category}"
        ))
    })
}
