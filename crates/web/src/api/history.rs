//! Merge history API endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use ldapmerge_core::db::DEFAULT_HISTORY_LIMIT;
use ldapmerge_core::models::HistoryEntry;

use crate::api::status::AppError;
use crate::AppState;

/// Upper bound for `?limit=`.
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/history", get(list_history))
        .route("/api/history/:id", get(get_history))
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let entries = state.db.list_history(Some(limit))?;
    Ok(Json(entries))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<HistoryEntry>, AppError> {
    Ok(Json(state.db.get_history(id)?))
}
