//! NSX connection profile API endpoints.
//!
//! Passwords are accepted on create and update but never returned.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use ldapmerge_core::models::ConnectionProfile;

use crate::api::status::AppError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    /// Omitted on update to keep the stored password.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub insecure: bool,
}

impl ProfileRequest {
    fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("name", &self.name),
            ("host", &self.host),
            ("username", &self.username),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{field} is required")));
            }
        }
        Ok(())
    }

    fn into_profile(self, id: Option<i64>) -> ConnectionProfile {
        ConnectionProfile {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            host: self.host.trim().to_string(),
            username: self.username,
            password: self.password,
            insecure: self.insecure,
            created_at: None,
            updated_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/configs", get(list_profiles).post(create_profile))
        .route(
            "/api/configs/:id",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
}

async fn list_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConnectionProfile>>, AppError> {
    Ok(Json(state.db.list_profiles()?))
}

async fn create_profile(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConnectionProfile>), AppError> {
    let Json(request) = body?;
    request.validate()?;

    let saved = state.db.save_profile(&request.into_profile(None))?;
    info!(id = ?saved.id, name = %saved.name, "created connection profile");
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ConnectionProfile>, AppError> {
    Ok(Json(state.db.get_profile(id)?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<ConnectionProfile>, AppError> {
    let Json(request) = body?;
    request.validate()?;

    let saved = state.db.save_profile(&request.into_profile(Some(id)))?;
    info!(id, name = %saved.name, "updated connection profile");
    Ok(Json(saved))
}

async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.db.delete_profile(id)?;
    info!(id, "deleted connection profile");
    Ok(StatusCode::NO_CONTENT)
}
