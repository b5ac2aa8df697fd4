//! HTTP endpoint handlers: read-only lookups the UI needs before or
//! alongside a WebSocket session. Each handler is a thin instrumented
//! wrapper over `AppState`.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use tracing::instrument;

use crate::economy::DEFAULT_EXAM_COST;
use crate::protocol::{CategoriesOut, ExamPriceOut, ExamPricesOut, HealthOut};
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(CategoriesOut {
        default_category: state.default_category.clone(),
        categories: state.categories.clone(),
    })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_exam_prices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let prices = state
        .pricing
        .price_list()
        .into_iter()
        .map(|(key, cost)| ExamPriceOut { key, cost })
        .collect();
    Json(ExamPricesOut {
        default_cost: DEFAULT_EXAM_COST,
        prices,
    })
}
