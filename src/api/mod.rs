//! HTTP vote API.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/api/votes` | GET | `{"votes": {"<item>": <count>}}` |
//! | `/api/vote` | POST `{"itemId": ...}` | `{"success": true, "itemId": "<item>"}` + `Set-Cookie` |
//! | `/health` | GET | `{"status": "ok"}` |
//!
//! Errors are `{"error": "<message>", "reason": "<code>"}`; see [`ErrorReason`].
//! Handlers are stateless apart from the shared [`VoteStore`].

mod error;
mod handlers;

pub use error::{ALREADY_VOTED_MESSAGE, ApiError, ErrorBody, ErrorReason};
pub use handlers::{CountsResponse, VoteRequest, VoteResponse};

use crate::config::{IdentityConfig, VotesConfig};
use crate::identity::VisitorIdResolver;
use crate::storage::VoteStore;
use crate::{Error, Result};
use axum::Router;
use axum::http::header;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The vote store.
    pub store: Arc<dyn VoteStore>,
    /// Visitor identity resolver.
    pub resolver: VisitorIdResolver,
    /// Identity cookie settings.
    pub identity: IdentityConfig,
}

impl AppState {
    /// Creates state with default identity settings.
    #[must_use]
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        Self {
            store,
            resolver: VisitorIdResolver::new(),
            identity: IdentityConfig::default(),
        }
    }

    /// Sets the identity cookie settings.
    #[must_use]
    pub const fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/votes", get(handlers::list_counts).fallback(handlers::method_not_allowed))
        .route("/api/vote", post(handlers::submit_vote).fallback(handlers::method_not_allowed))
        .route("/health", get(handlers::health))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until ctrl-c.
///
/// # Errors
///
/// Returns an error if the address is invalid, the listener cannot bind, or
/// the server fails.
pub async fn serve(config: &VotesConfig, store: Arc<dyn VoteStore>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::InvalidInput(format!("invalid server address: {e}")))?;

    let app = router(AppState::new(store).with_identity(config.identity));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })?;
    tracing::info!(%addr, "Vote API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })?;

    tracing::info!("Vote API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
}
