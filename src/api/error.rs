//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Message of the 400 sent for a repeated vote.
pub const ALREADY_VOTED_MESSAGE: &str = "Already voted for this item";

/// Machine-readable reason attached to every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The route does not accept the request method.
    MethodNotAllowed,
    /// The body is missing, malformed, or has an empty `itemId`.
    MissingItemId,
    /// The visitor already voted for the item.
    AlreadyVoted,
    /// The vote store failed.
    StoreUnavailable,
}

/// Error body: `{"error": "...", "reason": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: &'static str,
    /// Machine-readable reason.
    pub reason: ErrorReason,
}

/// An error response from the vote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    const fn new(status: StatusCode, error: &'static str, reason: ErrorReason) -> Self {
        Self {
            status,
            body: ErrorBody { error, reason },
        }
    }

    /// 405 for a wrong method.
    #[must_use]
    pub const fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            ErrorReason::MethodNotAllowed,
        )
    }

    /// 400 for a missing or unusable `itemId`.
    #[must_use]
    pub const fn missing_item_id() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "itemId is required",
            ErrorReason::MissingItemId,
        )
    }

    /// 400 for a repeated vote.
    #[must_use]
    pub const fn already_voted() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ALREADY_VOTED_MESSAGE,
            ErrorReason::AlreadyVoted,
        )
    }

    /// 500 with a store failure message.
    #[must_use]
    pub const fn store_unavailable(message: &'static str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            ErrorReason::StoreUnavailable,
        )
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
