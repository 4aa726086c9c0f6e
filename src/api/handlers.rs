//! Route handlers.

use super::AppState;
use super::error::ApiError;
use crate::identity::{RequestContext, VisitorCookie};
use crate::models::{ItemId, VoteCounts};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// `GET /api/votes` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountsResponse {
    /// Aggregate counts keyed by item id.
    pub votes: VoteCounts,
}

/// `POST /api/vote` request body.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// Item to vote for; a JSON string or integer.
    #[serde(rename = "itemId")]
    pub item_id: Option<ItemId>,
}

/// `POST /api/vote` success response.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    /// Always true.
    pub success: bool,
    /// The item that was voted for.
    #[serde(rename = "itemId")]
    pub item_id: ItemId,
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok".
    pub status: &'static str,
}

pub async fn list_counts(State(state): State<AppState>) -> Result<Json<CountsResponse>, ApiError> {
    let votes = state.store.all_counts().map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch votes");
        ApiError::store_unavailable("Failed to fetch votes")
    })?;
    tracing::debug!(items = votes.len(), "Listed vote counts");
    Ok(Json(CountsResponse { votes }))
}

/// Parses the body, extracting a non-blank item id.
fn parse_item_id(body: &[u8]) -> Option<ItemId> {
    serde_json::from_slice::<VoteRequest>(body)
        .ok()?
        .item_id
        .filter(|item| !item.is_blank())
}

pub async fn submit_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(item_id) = parse_item_id(&body) else {
        metrics::counter!("api_votes_rejected_total", "reason" => "missing_item_id").increment(1);
        return Err(ApiError::missing_item_id());
    };

    let context = RequestContext::from_headers(&headers);
    let visitor = state.resolver.resolve(&context);

    match state.store.has_voted(&visitor.voter_id, &item_id) {
        Ok(true) => {
            metrics::counter!("api_votes_rejected_total", "reason" => "already_voted")
                .increment(1);
            return Err(ApiError::already_voted());
        },
        Ok(false) => {},
        Err(e) => {
            tracing::error!(error = %e, item_id = %item_id, "Error checking existing vote");
            return Err(ApiError::store_unavailable("Failed to check vote"));
        },
    }

    match state.store.record_vote(&visitor.voter_id, &item_id) {
        Ok(_) => {},
        Err(e) if e.is_already_voted() => {
            metrics::counter!("api_votes_rejected_total", "reason" => "already_voted")
                .increment(1);
            return Err(ApiError::already_voted());
        },
        Err(e) => {
            tracing::error!(error = %e, item_id = %item_id, "Error recording vote");
            return Err(ApiError::store_unavailable("Failed to record vote"));
        },
    }

    let cookie = VisitorCookie::new(visitor.voter_id)
        .with_max_age(state.identity.cookie_max_age_secs)
        .with_secure(state.identity.cookie_secure);
    let mut response = Json(VoteResponse {
        success: true,
        item_id,
    })
    .into_response();

    // Unrepresentable ids only come from odd clients; the vote still stands.
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
        },
        Err(e) => {
            tracing::warn!(error = %e, issued = visitor.issued, "Visitor cookie not representable as a header");
        },
    }

    Ok(response)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
