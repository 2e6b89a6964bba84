//! Read-side view of the statistics the engine maintains, assembled from the
//! same keys dashboards read.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::error::Result;
use crate::store::{KeySpace, StatsStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub reports: i64,
    pub count: i64,
    pub sum_price: f64,
    pub average_price: Option<f64>,
    pub best_product: Option<String>,
    pub best_average_price: Option<f64>,
    pub best_quantity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub max_price: Option<f64>,
    pub min_price: Option<f64>,
    pub best_product: Option<String>,
    pub worst_product: Option<String>,
    pub categories: Vec<CategorySummary>,
}

async fn read_string(store: &dyn StatsStore, key: &str) -> Result<Option<String>> {
    Ok(store
        .get(key)
        .await?
        .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
}

fn number<T: std::str::FromStr>(raw: Option<&String>) -> Option<T> {
    raw.and_then(|s| s.trim().parse::<T>().ok())
}

/// Per-category hashes, each read whole.
struct CategoryHashes {
    reports: HashMap<String, String>,
    count: HashMap<String, String>,
    sum: HashMap<String, String>,
    average: HashMap<String, String>,
    best_product: HashMap<String, String>,
    best_average: HashMap<String, String>,
    best_quantity: HashMap<String, String>,
}

impl CategoryHashes {
    async fn load(store: &dyn StatsStore, keys: &KeySpace) -> Result<Self> {
        Ok(Self {
            reports: store.hgetall(&keys.reports_by_category()).await?,
            count: store.hgetall(&keys.count()).await?,
            sum: store.hgetall(&keys.sum_price()).await?,
            average: store.hgetall(&keys.category_average()).await?,
            best_product: store.hgetall(&keys.best_product_by_category()).await?,
            best_average: store.hgetall(&keys.best_average_price_by_category()).await?,
            best_quantity: store.hgetall(&keys.best_quantity_by_category()).await?,
        })
    }

    fn summary(&self, category: &str) -> CategorySummary {
        CategorySummary {
            category: category.to_string(),
            reports: number(self.reports.get(category)).unwrap_or(0),
            count: number(self.count.get(category)).unwrap_or(0),
            sum_price: number(self.sum.get(category)).unwrap_or(0.0),
            average_price: number(self.average.get(category)),
            best_product: self.best_product.get(category).cloned(),
            best_average_price: number(self.best_average.get(category)),
            best_quantity: number(self.best_quantity.get(category)),
        }
    }
}

pub async fn load_summary(store: &dyn StatsStore, keys: &KeySpace) -> Result<StatsSummary> {
    let hashes = CategoryHashes::load(store, keys).await?;
    let names: BTreeSet<&String> = hashes.reports.keys().chain(hashes.count.keys()).collect();
    let categories = names.into_iter().map(|c| hashes.summary(c)).collect();

    Ok(StatsSummary {
        max_price: number(read_string(store, &keys.max_price()).await?.as_ref()),
        min_price: number(read_string(store, &keys.min_price()).await?.as_ref()),
        best_product: read_string(store, &keys.best_product()).await?,
        worst_product: read_string(store, &keys.worst_product()).await?,
        categories,
    })
}

/// `None` when the category never received an event.
pub async fn load_category(store: &dyn StatsStore, keys: &KeySpace, category: &str) -> Result<Option<CategorySummary>> {
    let reports = store.hget(&keys.reports_by_category(), category).await?;
    let count = store.hget(&keys.count(), category).await?;
    if reports.is_none() && count.is_none() {
        return Ok(None);
    }
    Ok(Some(CategorySummary {
        category: category.to_string(),
        reports: number(reports.as_ref()).unwrap_or(0),
        count: number(count.as_ref()).unwrap_or(0),
        sum_price: number(store.hget(&keys.sum_price(), category).await?.as_ref()).unwrap_or(0.0),
        average_price: number(store.hget(&keys.category_average(), category).await?.as_ref()),
        best_product: store.hget(&keys.best_product_by_category(), category).await?,
        best_average_price: number(store.hget(&keys.best_average_price_by_category(), category).await?.as_ref()),
        best_quantity: number(store.hget(&keys.best_quantity_by_category(), category).await?.as_ref()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRICE_HISTORY_LIMIT;
    use crate::engine::Aggregator;
    use crate::store::MemoryStore;
    use crate::types::SaleEvent;

    fn sale(category: &str, product_id: &str, price: f64, quantity_sold: i32) -> SaleEvent {
        SaleEvent {
            category: category.to_string(),
            product_id: product_id.to_string(),
            price,
            quantity_sold,
            timestamp_ms: 1,
        }
    }

    #[tokio::test]
    async fn summary_reflects_aggregated_events() {
        let store = MemoryStore::new();
        let keys = KeySpace::default();
        let agg = Aggregator::new(store.clone(), keys.clone(), PRICE_HISTORY_LIMIT);
        agg.aggregate(&sale("Ropa", "SHIRT", 10.0, 2)).await.unwrap();
        agg.aggregate(&sale("Hogar", "LAMP", 30.0, 1)).await.unwrap();
        agg.aggregate(&sale("Hogar", "LAMP", 50.0, 1)).await.unwrap();

        let summary = load_summary(store.as_ref(), &keys).await.unwrap();
        assert_eq!(summary.max_price, Some(50.0));
        assert_eq!(summary.min_price, Some(10.0));
        assert_eq!(summary.best_product.as_deref(), Some("SHIRT (2)"));
        assert_eq!(summary.worst_product.as_deref(), Some("LAMP (2)"));

        let names: Vec<&str> = summary.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Hogar", "Ropa"]);
        let hogar = &summary.categories[0];
        assert_eq!(hogar.count, 2);
        assert_eq!(hogar.average_price, Some(40.0));
        assert_eq!(hogar.best_product.as_deref(), Some("LAMP"));
        assert_eq!(hogar.best_average_price, Some(40.0));
        assert_eq!(hogar.best_quantity, Some(2.0));

        let single = load_category(store.as_ref(), &keys, "Hogar").await.unwrap().unwrap();
        assert_eq!(&single, hogar);
    }

    #[tokio::test]
    async fn empty_store_yields_empty_summary() {
        let store = MemoryStore::new();
        let keys = KeySpace::default();
        let summary = load_summary(store.as_ref(), &keys).await.unwrap();
        assert!(summary.categories.is_empty());
        assert_eq!(summary.max_price, None);
        assert!(load_category(store.as_ref(), &keys, "Nope").await.unwrap().is_none());
    }
}
