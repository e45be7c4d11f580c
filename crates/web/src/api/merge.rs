//! Merge endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{info, warn};

use ldapmerge_core::merge::{count_certificates, merge};
use ldapmerge_core::models::{Domain, MergeRequest};

use crate::api::status::AppError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/merge", post(merge_domains))
}

/// Merge the posted domains with the posted certificate response and record
/// the run in history. A failed history write does not fail the request.
async fn merge_domains(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<Vec<Domain>>, AppError> {
    let Json(request) = body?;

    let result = merge(&request.initial, &request.response);
    info!(
        domains = result.len(),
        certificates = count_certificates(&result),
        "merged domains"
    );

    if let Err(e) = state
        .db
        .save_history(&request.initial, &request.response, &result)
    {
        warn!(error = %e, "failed to save merge history");
    }

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use ldapmerge_core::db::Database;
    use tower::ServiceExt;

    fn app(initialize: bool) -> axum::Router {
        let db = Database::in_memory().unwrap();
        if initialize {
            db.initialize().unwrap();
        }
        crate::WebServer::new(db).router()
    }

    fn post(body: &str) -> Request<Body> {
        Request::post("/api/merge")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const BODY: &str = r#"{
        "initial": [{"id":"example.lab","domain_name":"example.lab","base_dn":"DC=example,DC=lab",
                     "alternative_domain_names":[],"ldap_servers":[{"url":"ldaps://a:636","starttls":"false","enabled":"true"}]}],
        "response": {"results":[{"json":{"pem_encoded":"CERT1"},"item":{"url":"ldaps://a:636"}}]}
    }"#;

    #[tokio::test]
    async fn test_merge_succeeds_when_history_unavailable() {
        // no schema, so the history insert fails
        let resp = app(false).oneshot(post(BODY)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json[0]["ldap_servers"][0]["certificates"][0], "CERT1");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let resp = app(true).oneshot(post("{\"initial\": [")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["error"].as_str().unwrap().starts_with("invalid request body"));
    }
}
