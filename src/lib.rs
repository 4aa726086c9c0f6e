//! # Manifesto Votes
//!
//! Vote de-duplication, aggregation and ranking for a manifesto voting widget.
//!
//! Visitors vote for items on a static page; each vote is recorded once per
//! visitor identity, the per-item aggregate count increments, and the page
//! re-sorts items by popularity.
//!
//! ## Features
//!
//! - HTTP vote API (list counts, submit vote) with cookie-backed visitor identity
//! - Pluggable vote stores (`SQLite`, in-memory) with storage-level uniqueness
//! - Best-effort aggregate counting with an explicit read-modify-write fallback
//! - Client-side voting controller with per-item state machine
//! - Deterministic ranking by vote count
//!
//! ## Example
//!
//! ```rust,ignore
//! use manifesto_votes::storage::{LedgerVoteStore, MemoryVoteBackend, VoteStore};
//! use manifesto_votes::{ItemId, VoterId};
//!
//! let store = LedgerVoteStore::new(MemoryVoteBackend::new());
//! store.record_vote(&VoterId::new("visitor_1"), &ItemId::new("3"))?;
//! assert_eq!(store.all_counts()?.get(&ItemId::new("3")), 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod identity;
pub mod models;
pub mod observability;
pub mod storage;

pub use client::{
    ClientStorage, FileClientStorage, MemoryClientStorage, VoteGateway, VoteOutcome, VoteState,
    VotingController,
};
pub use config::VotesConfig;
pub use identity::{RequestContext, VisitorCookie, VisitorIdResolver};
pub use models::{ItemId, VoteCounts, VoteRecord, VotedItems, VoterId};
pub use storage::{LedgerVoteStore, RecordOutcome, VoteBackend, VoteStore};

/// Error type for vote operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing or malformed item id, unparseable request body |
/// | `MethodNotAllowed` | An API route is called with the wrong HTTP method |
/// | `AlreadyVoted` | A vote record already exists for the (visitor, item) pair |
/// | `OperationFailed` | Store reads/inserts fail, IO errors, HTTP transport errors |
/// | `AggregateUpdateFailed` | The atomic count increment is unavailable or fails |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The submitted item id is missing or empty
    /// - A request body is not valid JSON
    /// - A configuration value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The HTTP method is not accepted by the route.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The visitor already has a vote record for the item.
    ///
    /// Distinct from generic failures so that clients can treat it as a
    /// success-equivalent terminal state.
    #[error("already voted: visitor '{voter_id}' for item '{item_id}'")]
    AlreadyVoted {
        /// The visitor identity.
        voter_id: String,
        /// The item voted for.
        item_id: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Client storage files cannot be read or written
    /// - The vote API cannot be reached or returns a server error
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The aggregate count could not be incremented atomically.
    ///
    /// Never surfaced to API callers: the ledger recovers with a
    /// read-modify-write of the count.
    #[error("aggregate update failed for item '{item_id}': {cause}")]
    AggregateUpdateFailed {
        /// The item whose count was being updated.
        item_id: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true if this error is the "already voted" condition.
    #[must_use]
    pub const fn is_already_voted(&self) -> bool {
        matches!(self, Self::AlreadyVoted { .. })
    }
}

/// Result type alias for vote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
