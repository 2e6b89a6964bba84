use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{LatencyStats, Stage, StageLatency};
use crate::api::snapshot::{self, CategorySummary, StatsSummary};
use crate::engine::history::{self, PriceSample};
use crate::error::AppError;
use crate::store::{KeySpace, StatsStore};

/// Samples returned by the history endpoint when no `limit` is given.
const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn StatsStore>,
    pub keys: KeySpace,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    /// Upper bound for `?limit=`; series never hold more than this.
    pub history_limit: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/categories/:category", get(get_category))
        .route("/stats/history/:category/:product_id", get(get_price_history))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub store: &'static str,
    #[serde(flatten)]
    pub ingest: HealthSnapshot,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub category: String,
    pub product_id: String,
    pub samples: Vec<PriceSample>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub archive: StageLatency,
    pub aggregate: StageLatency,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        store: state.store.backend_name(),
        ingest: state.health.snapshot(),
    })
}

async fn get_stats_summary(State(state): State<ApiState>) -> Result<Json<StatsSummary>, AppError> {
    let summary = snapshot::load_summary(state.store.as_ref(), &state.keys).await?;
    Ok(Json(summary))
}

async fn get_category(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> Result<Json<CategorySummary>, AppError> {
    snapshot::load_category(state.store.as_ref(), &state.keys, &category)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("category {category}")))
}

async fn get_price_history(
    State(state): State<ApiState>,
    Path((category, product_id)): Path<(String, String)>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(state.history_limit);
    let samples =
        history::recent_samples(state.store.as_ref(), &state.keys, &category, &product_id, limit).await?;
    Ok(Json(HistoryResponse {
        category,
        product_id,
        samples,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        archive: state.latency.stage(Stage::Archive),
        aggregate: state.latency.stage(Stage::Aggregate),
    })
}
