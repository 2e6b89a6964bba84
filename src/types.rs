use serde::Serialize;

// ---------------------------------------------------------------------------
// Stream message
// ---------------------------------------------------------------------------

/// One message read from the sale stream. Identity is `(topic, partition, offset)`.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
    /// Broker-assigned timestamp in unix milliseconds, if the broker provided one.
    pub timestamp_ms: Option<i64>,
}

// ---------------------------------------------------------------------------
// Sale event
// ---------------------------------------------------------------------------

/// A decoded sale, already normalized (category / product id defaults applied).
/// Lives only for the duration of one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleEvent {
    pub category: String,
    pub product_id: String,
    pub price: f64,
    /// Only positive quantities move popularity rankings.
    pub quantity_sold: i32,
    /// Unix milliseconds; orders the price history series.
    pub timestamp_ms: i64,
}

impl SaleEvent {
    pub fn moves_popularity(&self) -> bool {
        self.quantity_sold > 0
    }
}

// ---------------------------------------------------------------------------
// Ranking entries
// ---------------------------------------------------------------------------

/// A product and its cumulative quantity score in some ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedProduct {
    pub product_id: String,
    pub quantity: f64,
}

impl std::fmt::Display for RankedProduct {
    /// Dashboard format: `"{productId} ({score})"` with the score as a whole number.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.0})", self.product_id, self.quantity)
    }
}

/// Most popular product of one category together with its own running average price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBest {
    pub product_id: String,
    pub average_price: f64,
    pub quantity: f64,
}

// ---------------------------------------------------------------------------
// Aggregation steps
// ---------------------------------------------------------------------------

/// The update routines run per event, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStep {
    CategoryStats,
    GlobalExtremes,
    GlobalPopularity,
    ProductPrice,
    CategoryBest,
    PriceHistory,
}

impl std::fmt::Display for AggregationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AggregationStep::CategoryStats => "category_stats",
            AggregationStep::GlobalExtremes => "global_extremes",
            AggregationStep::GlobalPopularity => "global_popularity",
            AggregationStep::ProductPrice => "product_price",
            AggregationStep::CategoryBest => "category_best",
            AggregationStep::PriceHistory => "price_history",
        };
        write!(f, "{s}")
    }
}

/// What the engine derived from one event; used for the success log line.
#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub category_count: i64,
    pub category_average: f64,
    /// Set when the category ranking had a leader with a recorded price.
    pub category_best: Option<CategoryBest>,
    /// Why the history append failed, if it did. Not fatal for the event.
    pub history_error: Option<String>,
}

impl AggregationReport {
    pub fn history_recorded(&self) -> bool {
        self.history_error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Loop outcomes
// ---------------------------------------------------------------------------

/// Where one pass of the ingestion loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The read failed; the loop backs off before reading again.
    ReadFailed,
    /// The raw archive write failed; nothing was derived.
    ArchiveFailed,
    /// Archived but undecodable; nothing was derived.
    Malformed,
    /// A statistic-critical step failed; later steps were skipped.
    AggregationFailed(AggregationStep),
    /// Every statistic-critical step succeeded.
    Aggregated,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::ReadFailed => write!(f, "read_failed"),
            Outcome::ArchiveFailed => write!(f, "archive_failed"),
            Outcome::Malformed => write!(f, "malformed"),
            Outcome::AggregationFailed(step) => write!(f, "aggregation_failed({step})"),
            Outcome::Aggregated => write!(f, "aggregated"),
        }
    }
}
