//! How a controller reaches the vote store.
//!
//! | Gateway | Store | Identity |
//! |---------|-------|----------|
//! | [`HttpVoteGateway`] | the HTTP vote API | `visitor_id` cookie, carried like a browser |
//! | [`SessionVoteGateway`] | counts in client storage | the client storage itself |
//! | [`DirectGateway`] | an in-process [`VoteStore`] | fixed [`VoterId`] |

use crate::api::{ALREADY_VOTED_MESSAGE, CountsResponse, ErrorReason};
use crate::client::storage::{
    ClientStorage, LOCAL_COUNTS_KEY, load_local_counts, load_voted_items, save_json,
};
use crate::identity::VisitorCookie;
use crate::models::{ItemId, VoteCounts, VoterId};
use crate::storage::{VoteStore, acquire_lock};
use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Deserialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Request timeout of the HTTP gateway.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport used by the voting controller.
///
/// `submit_vote` returns `Err(Error::AlreadyVoted { .. })` when the store
/// already holds a vote for the item; the controller treats that as success.
pub trait VoteGateway: Send + Sync {
    /// Fetches all aggregate counts.
    fn fetch_counts(&self) -> impl Future<Output = Result<VoteCounts>> + Send;

    /// Submits one vote for `item_id`.
    fn submit_vote(&self, item_id: &ItemId) -> impl Future<Output = Result<()>> + Send;
}

/// Gateway to the HTTP vote API.
pub struct HttpVoteGateway {
    client: reqwest::Client,
    base_url: String,
    visitor: Mutex<Option<VoterId>>,
}

impl HttpVoteGateway {
    /// Creates a gateway for the API at `base_url` (e.g. `http://127.0.0.1:8080`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "build_http_client".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            visitor: Mutex::new(None),
        })
    }

    /// Presets the visitor id sent as a cookie.
    #[must_use]
    pub fn with_visitor(mut self, visitor: Option<VoterId>) -> Self {
        self.visitor = Mutex::new(visitor);
        self
    }

    /// Returns the visitor id currently held, if the server issued one.
    #[must_use]
    pub fn visitor(&self) -> Option<VoterId> {
        acquire_lock(&self.visitor).clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_cookie(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.visitor() {
            Some(visitor) => request.header(COOKIE, format!("visitor_id={visitor}")),
            None => request,
        }
    }

    fn remember_cookie(&self, response: &reqwest::Response) {
        let issued = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(VisitorCookie::parse_set_cookie);
        if let Some(visitor) = issued {
            *acquire_lock(&self.visitor) = Some(visitor);
        }
    }
}

/// Error body as seen by a client.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
    #[serde(default)]
    reason: Option<ErrorReason>,
}

impl ErrorPayload {
    /// Servers without a `reason` field only send the message text.
    fn is_already_voted(&self, status: StatusCode) -> bool {
        match self.reason {
            Some(reason) => reason == ErrorReason::AlreadyVoted,
            None => status == StatusCode::BAD_REQUEST && self.error == ALREADY_VOTED_MESSAGE,
        }
    }
}

fn transport_error(operation: &str, e: &reqwest::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

impl VoteGateway for HttpVoteGateway {
    async fn fetch_counts(&self) -> Result<VoteCounts> {
        let response = self
            .with_cookie(self.client.get(self.url("/api/votes")))
            .send()
            .await
            .map_err(|e| transport_error("fetch_counts", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::OperationFailed {
                operation: "fetch_counts".to_string(),
                cause: format!("server returned {status}"),
            });
        }

        let body: CountsResponse = response
            .json()
            .await
            .map_err(|e| transport_error("decode_counts", &e))?;
        Ok(body.votes)
    }

    async fn submit_vote(&self, item_id: &ItemId) -> Result<()> {
        let response = self
            .with_cookie(self.client.post(self.url("/api/vote")))
            .json(&serde_json::json!({ "itemId": item_id }))
            .send()
            .await
            .map_err(|e| transport_error("submit_vote", &e))?;

        self.remember_cookie(&response);
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.json::<ErrorPayload>().await.ok();
        if body.as_ref().is_some_and(|b| b.is_already_voted(status)) {
            return Err(Error::AlreadyVoted {
                voter_id: self.visitor().map(|v| v.to_string()).unwrap_or_default(),
                item_id: item_id.to_string(),
            });
        }
        match status {
            StatusCode::BAD_REQUEST => Err(Error::InvalidInput(
                body.map_or_else(|| "bad request".to_string(), |b| b.error),
            )),
            StatusCode::METHOD_NOT_ALLOWED => {
                Err(Error::MethodNotAllowed("POST /api/vote".to_string()))
            },
            _ => Err(Error::OperationFailed {
                operation: "submit_vote".to_string(),
                cause: body.map_or_else(
                    || format!("server returned {status}"),
                    |b| format!("server returned {status}: {}", b.error),
                ),
            }),
        }
    }
}

/// Local variant: counts live in the client's own storage.
///
/// Checks the voted set before counting, so a vote for an already-voted item
/// reports `AlreadyVoted` and leaves counts alone. Storage failures are
/// logged and never fail a vote; the controller keeps counting in memory.
pub struct SessionVoteGateway<S: ClientStorage> {
    storage: S,
}

impl<S: ClientStorage> SessionVoteGateway<S> {
    /// Creates a gateway over `storage`.
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }
}

impl<S: ClientStorage> VoteGateway for SessionVoteGateway<S> {
    async fn fetch_counts(&self) -> Result<VoteCounts> {
        Ok(load_local_counts(&self.storage))
    }

    async fn submit_vote(&self, item_id: &ItemId) -> Result<()> {
        if load_voted_items(&self.storage).contains(item_id) {
            return Err(Error::AlreadyVoted {
                voter_id: "session".to_string(),
                item_id: item_id.to_string(),
            });
        }
        let mut counts = load_local_counts(&self.storage);
        let count = counts.increment(item_id);
        if let Err(e) = save_json(&self.storage, LOCAL_COUNTS_KEY, &counts) {
            tracing::warn!(item_id = %item_id, error = %e, "Failed to save local counts");
        }
        tracing::debug!(item_id = %item_id, count, "Counted vote locally");
        Ok(())
    }
}

/// Gateway to an in-process store under a fixed identity.
pub struct DirectGateway {
    store: Arc<dyn VoteStore>,
    voter_id: VoterId,
}

impl DirectGateway {
    /// Creates a gateway voting as `voter_id`.
    pub fn new(store: Arc<dyn VoteStore>, voter_id: VoterId) -> Self {
        Self { store, voter_id }
    }
}

impl VoteGateway for DirectGateway {
    async fn fetch_counts(&self) -> Result<VoteCounts> {
        self.store.all_counts()
    }

    async fn submit_vote(&self, item_id: &ItemId) -> Result<()> {
        self.store.record_vote(&self.voter_id, item_id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{MemoryClientStorage, VOTED_ITEMS_KEY};
    use crate::storage::{LedgerVoteStore, MemoryVoteBackend};

    #[tokio::test]
    async fn test_session_gateway_counts_and_guards() {
        let storage = Arc::new(MemoryClientStorage::new());
        let gateway = SessionVoteGateway::new(Arc::clone(&storage));
        let item = ItemId::new("4");

        gateway.submit_vote(&item).await.unwrap();
        assert_eq!(gateway.fetch_counts().await.unwrap().get(&item), 1);

        storage.set(VOTED_ITEMS_KEY, r#"["4"]"#).unwrap();
        let err = gateway.submit_vote(&item).await.unwrap_err();
        assert!(err.is_already_voted());
        assert_eq!(gateway.fetch_counts().await.unwrap().get(&item), 1);
    }

    #[tokio::test]
    async fn test_direct_gateway_reports_duplicates() {
        let store: Arc<dyn VoteStore> = Arc::new(LedgerVoteStore::new(MemoryVoteBackend::new()));
        let gateway = DirectGateway::new(store, VoterId::new("v1"));
        let item = ItemId::new("1");

        gateway.submit_vote(&item).await.unwrap();
        assert!(gateway.submit_vote(&item).await.unwrap_err().is_already_voted());
        assert_eq!(gateway.fetch_counts().await.unwrap().get(&item), 1);
    }

    #[test]
    fn test_error_payload_already_voted_by_reason_or_message() {
        let decode = |raw: &str| serde_json::from_str::<ErrorPayload>(raw).unwrap();

        let tagged = decode(r#"{"error":"x","reason":"already_voted"}"#);
        assert!(tagged.is_already_voted(StatusCode::BAD_REQUEST));

        let untagged = decode(r#"{"error":"Already voted for this item"}"#);
        assert!(untagged.is_already_voted(StatusCode::BAD_REQUEST));
        assert!(!untagged.is_already_voted(StatusCode::INTERNAL_SERVER_ERROR));

        let missing = decode(r#"{"error":"itemId is required","reason":"missing_item_id"}"#);
        assert!(!missing.is_already_voted(StatusCode::BAD_REQUEST));
        let other = decode(r#"{"error":"itemId is required"}"#);
        assert!(!other.is_already_voted(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_session_gateway_tolerates_storage_failures() {
        struct QuotaExceeded;

        impl ClientStorage for QuotaExceeded {
            fn get(&self, _key: &str) -> Result<Option<String>> {
                Ok(Some("not json".to_string()))
            }

            fn set(&self, _key: &str, _value: &str) -> Result<()> {
                Err(Error::OperationFailed {
                    operation: "write_client_storage".to_string(),
                    cause: "quota exceeded".to_string(),
                })
            }
        }

        let gateway = SessionVoteGateway::new(QuotaExceeded);
        assert!(gateway.fetch_counts().await.unwrap().is_empty());
        gateway.submit_vote(&ItemId::new("1")).await.unwrap();
        gateway.submit_vote(&ItemId::new("1")).await.unwrap();
    }

    #[test]
    fn test_http_gateway_normalises_base_url() {
        let gateway = HttpVoteGateway::new("http://localhost:8080/").unwrap();
        assert_eq!(gateway.url("/api/votes"), "http://localhost:8080/api/votes");
        assert!(gateway.visitor().is_none());

        let gateway = gateway.with_visitor(Some(VoterId::new("visitor_1_abc")));
        assert_eq!(gateway.visitor(), Some(VoterId::new("visitor_1_abc")));
    }
}
