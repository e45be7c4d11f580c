//! ldapmerge REST API.
//!
//! Exposes the merge engine over HTTP, records each merge in the history
//! store, and manages saved NSX connection profiles.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ldapmerge_core::db::Database;

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub db: Database,
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(db: Database) -> Self {
        Self {
            state: Arc::new(AppState { db }),
        }
    }

    /// Build the full application router.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .merge(api::status::routes())
            .merge(api::merge::routes())
            .merge(api::history::routes())
            .merge(api::configs::routes())
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Bind `listen_addr` (e.g. `0.0.0.0:8080`) and serve until the process exits.
    pub async fn start(self, listen_addr: &str) -> anyhow::Result<()> {
        let addr: SocketAddr = listen_addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "starting web server");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
