//! Health check endpoint and the shared API error type.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{error, warn};

use ldapmerge_core::db::DbInfo;
use ldapmerge_core::errors::DatabaseError;
use ldapmerge_core::version;

use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<DbInfo>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/health", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.db.info() {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(error = %e, "failed to read database info");
            None
        }
    };
    Json(HealthResponse {
        status: "ok",
        version: version::VERSION,
        database,
    })
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// API error type that converts to a `{"error": ...}` JSON response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { .. } => AppError::NotFound(e.to_string()),
            _ if e.is_unique_violation() => AppError::Conflict(e.to_string()),
            _ => AppError::Internal(format!("database error: {e}")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ldapmerge_core::db::Database;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_includes_database() {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        let app = crate::WebServer::new(db).router();

        let resp = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], version::VERSION);
        assert_eq!(json["database"]["path"], ":memory:");
        assert_eq!(json["database"]["tables"], 2);
    }

    #[test]
    fn test_database_error_mapping() {
        let err: AppError = DatabaseError::NotFound {
            entity: "history entry".into(),
            id: "3".into(),
        }
        .into();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "history entry not found: 3"));
    }
}
