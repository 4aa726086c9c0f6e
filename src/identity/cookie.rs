//! The `visitor_id` cookie.

use crate::models::VoterId;
use std::fmt;

/// Cookie name carrying the visitor identity.
pub const VISITOR_COOKIE_NAME: &str = "visitor_id";

/// Default cookie lifetime: one year.
pub const DEFAULT_COOKIE_MAX_AGE_SECS: u64 = 31_536_000;

/// Response cookie that issues or renews a visitor identity.
///
/// Renders as `visitor_id=<id>; Path=/; Max-Age=<secs>; SameSite=Lax`. The
/// cookie is deliberately readable by page scripts (no `HttpOnly`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisitorCookie {
    voter_id: VoterId,
    max_age_secs: u64,
    secure: bool,
}

impl VisitorCookie {
    /// Creates a cookie with the default one-year lifetime.
    #[must_use]
    pub const fn new(voter_id: VoterId) -> Self {
        Self {
            voter_id,
            max_age_secs: DEFAULT_COOKIE_MAX_AGE_SECS,
            secure: false,
        }
    }

    /// Sets the `Max-Age` attribute.
    #[must_use]
    pub const fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Adds the `Secure` attribute.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Returns the identity carried by the cookie.
    #[must_use]
    pub const fn voter_id(&self) -> &VoterId {
        &self.voter_id
    }

    /// Extracts the visitor id from a `Set-Cookie` header value.
    #[must_use]
    pub fn parse_set_cookie(header: &str) -> Option<VoterId> {
        let (pair, _attributes) = header.split_once(';').unwrap_or((header, ""));
        let (name, value) = pair.split_once('=')?;
        if name.trim() != VISITOR_COOKIE_NAME {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| VoterId::new(value))
    }
}

impl fmt::Display for VisitorCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{VISITOR_COOKIE_NAME}={}; Path=/; Max-Age={}; SameSite=Lax",
            self.voter_id, self.max_age_secs
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Finds the `visitor_id` value in a `Cookie` request header.
///
/// Matches the exact cookie name; empty values count as absent.
pub(super) fn find_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == VISITOR_COOKIE_NAME)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
