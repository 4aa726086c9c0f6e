//! Visitor identity resolution.
//!
//! The server variant identifies a browser by a `visitor_id` cookie. When the
//! cookie is absent a fresh token is synthesised; the vote handler is
//! responsible for handing it back to the client in a `Set-Cookie` header.
//!
//! There is no collision handling: two tabs without a cookie can be issued two
//! identities. Stronger identity (accounts, fingerprints) is out of scope.

mod cookie;

pub use cookie::{DEFAULT_COOKIE_MAX_AGE_SECS, VISITOR_COOKIE_NAME, VisitorCookie};

use crate::models::VoterId;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Number of base36 characters in a generated visitor id suffix.
const SUFFIX_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Per-request view of the caller's identity.
///
/// Cookie parsing happens once, when the context is built; business logic
/// only sees the typed accessor.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    visitor_id: Option<VoterId>,
}

impl RequestContext {
    /// Creates an anonymous context (no identity cookie).
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { visitor_id: None }
    }

    /// Creates a context for a known visitor.
    #[must_use]
    pub const fn with_visitor(visitor_id: VoterId) -> Self {
        Self {
            visitor_id: Some(visitor_id),
        }
    }

    /// Builds a context from request headers.
    ///
    /// Every `Cookie` header is considered; headers that are not valid ASCII
    /// are ignored.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let visitor_id = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(cookie::find_cookie)
            .map(VoterId::new);
        Self { visitor_id }
    }

    /// Builds a context from a raw `Cookie` header value.
    #[must_use]
    pub fn from_cookie_header(header: &str) -> Self {
        Self {
            visitor_id: cookie::find_cookie(header).map(VoterId::new),
        }
    }

    /// Returns the visitor id carried by the request, if any.
    #[must_use]
    pub const fn visitor_id(&self) -> Option<&VoterId> {
        self.visitor_id.as_ref()
    }
}

/// Outcome of identity resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedVisitor {
    /// The visitor identity to use for de-duplication.
    pub voter_id: VoterId,
    /// True if the identity was synthesised for this request.
    pub issued: bool,
}

/// Derives a voter identity from a request context.
#[derive(Clone, Debug, Default)]
pub struct VisitorIdResolver;

impl VisitorIdResolver {
    /// Creates a new resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the request's visitor id, or synthesises a new one.
    #[must_use]
    pub fn resolve(&self, context: &RequestContext) -> ResolvedVisitor {
        context.visitor_id().map_or_else(
            || {
                let voter_id = self.generate();
                tracing::debug!(visitor_id = %voter_id, "Issued new visitor id");
                ResolvedVisitor {
                    voter_id,
                    issued: true,
                }
            },
            |voter_id| ResolvedVisitor {
                voter_id: voter_id.clone(),
                issued: false,
            },
        )
    }

    /// Generates a new visitor id stamped with the current time.
    #[must_use]
    pub fn generate(&self) -> VoterId {
        generate_visitor_id(crate::current_timestamp_millis(), uuid::Uuid::new_v4().as_u128())
    }
}

/// Formats `visitor_<millis>_<suffix>` where the suffix is nine base36
/// characters drawn from `entropy`.
fn generate_visitor_id(millis: u64, entropy: u128) -> VoterId {
    let mut remaining = entropy;
    let mut suffix = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        // remaining % 36 < 36
        #[allow(clippy::cast_possible_truncation)]
        let digit = (remaining % 36) as usize;
        suffix.push(char::from(BASE36[digit]));
        remaining /= 36;
    }
    VoterId::new(format!("visitor_{millis}_{suffix}"))
}
