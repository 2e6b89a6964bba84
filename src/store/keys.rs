//! Key naming for everything the engine writes. Dashboards read these names,
//! so they are a stable contract.

/// Builds store keys, optionally under a `{prefix}:` namespace.
#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    prefix: Option<String>,
}

impl KeySpace {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    fn key(&self, name: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{name}"),
            None => name.to_string(),
        }
    }

    /// STRING: raw payload of one stream message.
    pub fn raw_event(&self, topic: &str, partition: i32, offset: i64) -> String {
        self.key(&format!("event:{topic}:{partition}:{offset}"))
    }

    // --- per-category hashes (field = category) ---

    pub fn sum_price(&self) -> String {
        self.key("stats:sumPrice")
    }

    pub fn count(&self) -> String {
        self.key("stats:count")
    }

    pub fn category_average(&self) -> String {
        self.key("stats:categoryAverage")
    }

    pub fn reports_by_category(&self) -> String {
        self.key("stats:reportsByCategory")
    }

    pub fn best_product_by_category(&self) -> String {
        self.key("stats:bestProductByCategory")
    }

    pub fn best_average_price_by_category(&self) -> String {
        self.key("stats:bestAveragePriceByCategory")
    }

    pub fn best_quantity_by_category(&self) -> String {
        self.key("stats:bestQuantityByCategory")
    }

    // --- global strings ---

    pub fn max_price(&self) -> String {
        self.key("stats:maxPrice")
    }

    pub fn min_price(&self) -> String {
        self.key("stats:minPrice")
    }

    pub fn best_product(&self) -> String {
        self.key("stats:bestProduct")
    }

    pub fn worst_product(&self) -> String {
        self.key("stats:worstProduct")
    }

    /// ZSET: product id → cumulative quantity across all categories.
    pub fn product_popularity(&self) -> String {
        self.key("stats:productPopularity")
    }

    // --- category-scoped ---

    /// ZSET: product id → cumulative quantity within `category`.
    pub fn category_popularity(&self, category: &str) -> String {
        self.key(&format!("stats:productPopularity:{category}"))
    }

    /// HASH: product id → cumulative price within `category`.
    pub fn product_sum_price(&self, category: &str) -> String {
        self.key(&format!("stats:sumPriceByProduct:{category}"))
    }

    /// HASH: product id → sale count within `category`.
    pub fn product_count(&self, category: &str) -> String {
        self.key(&format!("stats:countByProduct:{category}"))
    }

    /// ZSET: the bounded price series of one product in one category.
    /// The same key is written and trimmed.
    pub fn price_history(&self, category: &str, product_id: &str) -> String {
        self.key(&format!("stats:priceHistory:{category}:{product_id}"))
    }
}
