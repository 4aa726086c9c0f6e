//! Integration tests for the HTTP vote API.
//!
//! Requests go through the full router (including middleware) via
//! `tower::ServiceExt::oneshot`; no socket is bound.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use manifesto_votes::api::{AppState, router};
use manifesto_votes::config::IdentityConfig;
use manifesto_votes::storage::{AggregatePath, LedgerVoteStore, MemoryVoteBackend, SqliteVoteBackend};
use manifesto_votes::{Error, ItemId, RecordOutcome, Result, VoteCounts, VoteRecord, VoteStore, VoterId};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower::ServiceExt;

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap())
    }

    fn issued_visitor(&self) -> String {
        let cookie = self.set_cookie().expect("Set-Cookie header");
        let pair = cookie.split(';').next().unwrap();
        pair.strip_prefix("visitor_id=").unwrap().to_string()
    }
}

fn memory_store() -> Arc<dyn VoteStore> {
    Arc::new(LedgerVoteStore::new(MemoryVoteBackend::new()))
}

fn app(store: &Arc<dyn VoteStore>) -> Router {
    router(AppState::new(Arc::clone(store)))
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}

fn post_vote(body: &str, visitor: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/vote")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(visitor) = visitor {
        builder = builder.header(header::COOKIE, format!("theme=dark; visitor_id={visitor}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn count_of(store: &Arc<dyn VoteStore>, item: &str) -> u64 {
    store.all_counts().unwrap().get(&ItemId::new(item))
}

// ============================================================================
// List counts
// ============================================================================

#[tokio::test]
async fn test_list_counts_empty_store() {
    let store = memory_store();
    let reply = send(&app(&store), get("/api/votes")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"votes": {}}));
}

#[tokio::test]
async fn test_list_counts_reports_every_voted_item() {
    let store = memory_store();
    for (voter, item) in [("a", "1"), ("b", "1"), ("a", "2")] {
        store.record_vote(&VoterId::new(voter), &ItemId::new(item)).unwrap();
    }

    let reply = send(&app(&store), get("/api/votes")).await;
    assert_eq!(reply.body, json!({"votes": {"1": 2, "2": 1}}));
}

/// Scenario D: a non-GET list call is rejected and mutates nothing.
#[tokio::test]
async fn test_list_counts_wrong_method() {
    let store = memory_store();
    let app = app(&store);

    for method in [Method::POST, Method::PUT, Method::DELETE] {
        let request = Request::builder()
            .method(method)
            .uri("/api/votes")
            .body(Body::from(r#"{"itemId":"1"}"#))
            .unwrap();
        let reply = send(&app, request).await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            reply.body,
            json!({"error": "Method not allowed", "reason": "method_not_allowed"})
        );
    }
    assert!(store.all_counts().unwrap().is_empty());
}

// ============================================================================
// Submit vote
// ============================================================================

/// Scenario A: first vote counts, echoes the item, and issues an identity.
#[tokio::test]
async fn test_first_vote_counts_and_sets_cookie() {
    let store = memory_store();
    let reply = send(&app(&store), post_vote(r#"{"itemId":"3"}"#, None)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"success": true, "itemId": "3"}));

    let cookie = reply.set_cookie().unwrap();
    assert!(cookie.starts_with("visitor_id=visitor_"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=31536000"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("HttpOnly"));
    assert!(!cookie.contains("Secure"));

    assert_eq!(count_of(&store, "3"), 1);
    let visitor = VoterId::new(reply.issued_visitor());
    assert!(store.has_voted(&visitor, &ItemId::new("3")).unwrap());
}

/// Scenario B: the same identity voting twice gets `already_voted`.
#[tokio::test]
async fn test_second_vote_same_identity_rejected() {
    let store = memory_store();
    let app = app(&store);

    let first = send(&app, post_vote(r#"{"itemId":"3"}"#, None)).await;
    let visitor = first.issued_visitor();

    let second = send(&app, post_vote(r#"{"itemId":"3"}"#, Some(&visitor))).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        second.body,
        json!({"error": "Already voted for this item", "reason": "already_voted"})
    );
    assert!(second.set_cookie().is_none());
    assert_eq!(count_of(&store, "3"), 1);
}

#[tokio::test]
async fn test_existing_identity_is_kept_and_renewed() {
    let store = memory_store();
    let reply = send(
        &app(&store),
        post_vote(r#"{"itemId":"2"}"#, Some("visitor_1_returning")),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.issued_visitor(), "visitor_1_returning");
    assert!(
        store
            .has_voted(&VoterId::new("visitor_1_returning"), &ItemId::new("2"))
            .unwrap()
    );
}

#[tokio::test]
async fn test_same_identity_different_items() {
    let store = memory_store();
    let app = app(&store);

    for item in ["1", "2", "3"] {
        let reply = send(
            &app,
            post_vote(&format!(r#"{{"itemId":"{item}"}}"#), Some("visitor_1_x")),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "item {item}");
    }
    assert_eq!(store.all_counts().unwrap().total(), 3);
}

#[tokio::test]
async fn test_cookieless_requests_get_distinct_identities() {
    let store = memory_store();
    let app = app(&store);

    let a = send(&app, post_vote(r#"{"itemId":"1"}"#, None)).await;
    let b = send(&app, post_vote(r#"{"itemId":"1"}"#, None)).await;
    assert_ne!(a.issued_visitor(), b.issued_visitor());
    assert_eq!(count_of(&store, "1"), 2);
}

#[tokio::test]
async fn test_integer_item_id_is_normalised() {
    let store = memory_store();
    let reply = send(&app(&store), post_vote(r#"{"itemId":5}"#, None)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["itemId"], json!("5"));
    assert_eq!(count_of(&store, "5"), 1);
}

#[tokio::test]
async fn test_missing_item_id_rejected() {
    let store = memory_store();
    let app = app(&store);

    for body in ["", "{}", r#"{"itemId":""}"#, r#"{"itemId":null}"#, "[]", "{oops"] {
        let reply = send(&app, post_vote(body, None)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(
            reply.body,
            json!({"error": "itemId is required", "reason": "missing_item_id"})
        );
        assert!(reply.set_cookie().is_none());
    }
    assert!(store.all_counts().unwrap().is_empty());
}

#[tokio::test]
async fn test_vote_wrong_method() {
    let store = memory_store();
    let reply = send(&app(&store), get("/api/vote")).await;

    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.body["reason"], json!("method_not_allowed"));
}

#[tokio::test]
async fn test_secure_cookie_when_configured() {
    let store = memory_store();
    let app = router(AppState::new(Arc::clone(&store)).with_identity(IdentityConfig {
        cookie_max_age_secs: 60,
        cookie_secure: true,
    }));

    let reply = send(&app, post_vote(r#"{"itemId":"1"}"#, None)).await;
    let cookie = reply.set_cookie().unwrap();
    assert!(cookie.contains("Max-Age=60"));
    assert!(cookie.ends_with("; Secure"));
}

/// Scenario E: without the atomic increment, one vote still counts once.
#[tokio::test]
async fn test_fallback_aggregate_counts_once() {
    let store: Arc<dyn VoteStore> = Arc::new(LedgerVoteStore::new(
        SqliteVoteBackend::in_memory()
            .unwrap()
            .with_atomic_increment(false),
    ));
    let app = app(&store);

    let reply = send(&app, post_vote(r#"{"itemId":"4"}"#, None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(count_of(&store, "4"), 1);

    send(&app, post_vote(r#"{"itemId":"4"}"#, None)).await;
    assert_eq!(count_of(&store, "4"), 2);
}

// ============================================================================
// Store failures
// ============================================================================

/// Store with switchable failures.
#[derive(Default)]
struct FailingStore {
    fail_counts: AtomicBool,
    fail_check: AtomicBool,
    fail_record: AtomicBool,
    /// `has_voted` says no, but `record_vote` hits the uniqueness constraint.
    lose_race: AtomicBool,
    aggregate_skipped: AtomicBool,
}

fn store_down(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "connection refused".to_string(),
    }
}

impl VoteStore for FailingStore {
    fn all_counts(&self) -> Result<VoteCounts> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(store_down("select_counts"));
        }
        Ok(VoteCounts::new())
    }

    fn has_voted(&self, _voter_id: &VoterId, _item_id: &ItemId) -> Result<bool> {
        if self.fail_check.load(Ordering::SeqCst) {
            return Err(store_down("find_vote"));
        }
        Ok(false)
    }

    fn record_vote(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<RecordOutcome> {
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(store_down("insert_vote"));
        }
        if self.lose_race.load(Ordering::SeqCst) {
            return Err(Error::AlreadyVoted {
                voter_id: voter_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        let aggregate = if self.aggregate_skipped.load(Ordering::SeqCst) {
            AggregatePath::Skipped
        } else {
            AggregatePath::Atomic
        };
        Ok(RecordOutcome {
            record: VoteRecord::new(voter_id.clone(), item_id.clone()),
            aggregate,
        })
    }
}

fn failing(configure: impl FnOnce(&FailingStore)) -> Router {
    let store = FailingStore::default();
    configure(&store);
    router(AppState::new(Arc::new(store)))
}

#[tokio::test]
async fn test_list_counts_store_failure() {
    let app = failing(|s| s.fail_counts.store(true, Ordering::SeqCst));
    let reply = send(&app, get("/api/votes")).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        reply.body,
        json!({"error": "Failed to fetch votes", "reason": "store_unavailable"})
    );
}

#[tokio::test]
async fn test_check_failure() {
    let app = failing(|s| s.fail_check.store(true, Ordering::SeqCst));
    let reply = send(&app, post_vote(r#"{"itemId":"1"}"#, None)).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        reply.body,
        json!({"error": "Failed to check vote", "reason": "store_unavailable"})
    );
}

#[tokio::test]
async fn test_record_failure() {
    let app = failing(|s| s.fail_record.store(true, Ordering::SeqCst));
    let reply = send(&app, post_vote(r#"{"itemId":"1"}"#, None)).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        reply.body,
        json!({"error": "Failed to record vote", "reason": "store_unavailable"})
    );
    assert!(reply.set_cookie().is_none());
}

#[tokio::test]
async fn test_lost_race_reports_already_voted() {
    let app = failing(|s| s.lose_race.store(true, Ordering::SeqCst));
    let reply = send(&app, post_vote(r#"{"itemId":"1"}"#, Some("visitor_1_y"))).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["reason"], json!("already_voted"));
}

#[tokio::test]
async fn test_skipped_aggregate_still_succeeds() {
    let app = failing(|s| s.aggregate_skipped.store(true, Ordering::SeqCst));
    let reply = send(&app, post_vote(r#"{"itemId":"1"}"#, None)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.set_cookie().is_some());
}

// ============================================================================
// Ambient routes and headers
// ============================================================================

#[tokio::test]
async fn test_health() {
    let store = memory_store();
    let reply = send(&app(&store), get("/health")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let store = memory_store();
    let app = app(&store);

    for request in [get("/api/votes"), post_vote("{}", None), get("/health")] {
        let reply = send(&app, request).await;
        assert_eq!(reply.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(reply.headers[header::CACHE_CONTROL], "no-store");
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let store = memory_store();
    let reply = send(&app(&store), get("/api/unknown")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
