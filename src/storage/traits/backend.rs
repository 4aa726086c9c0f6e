//! Row-level vote backend trait.
//!
//! A vote backend models the hosted database behind the vote API: a
//! vote-record table keyed by `(voter_id, item_id)` with a uniqueness
//! constraint, and an aggregate table keyed by `item_id` with an integer count.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Uniqueness |
//! |---------|----------|------------|
//! | `SqliteVoteBackend` | Default; embedded, durable | `UNIQUE(visitor_id, item_id)` |
//! | `MemoryVoteBackend` | Tests, ephemeral servers | set insert under a mutex |
//!
//! # Error Modes
//!
//! | Operation | Error | Meaning |
//! |-----------|-------|---------|
//! | `insert_vote` | `Error::AlreadyVoted` | uniqueness constraint rejected the row |
//! | `increment_count` | `Error::AggregateUpdateFailed` | atomic increment unavailable or failed |
//! | any | `Error::OperationFailed` | store unreachable, lock or query failure |

use crate::Result;
use crate::models::{ItemId, VoteRecord, VoterId};

/// Trait for vote storage backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `insert_vote` MUST enforce uniqueness in the storage layer itself; an
///   application-level check is not enough under concurrent inserts
/// - `upsert_count` is last-write-wins keyed by item id
pub trait VoteBackend: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Looks up the vote record for a `(voter, item)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_vote(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<Option<VoteRecord>>;

    /// Inserts a vote record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AlreadyVoted`] if a record for the pair already
    /// exists, or an error if the insert fails.
    fn insert_vote(&self, record: &VoteRecord) -> Result<()>;

    /// Atomically increments the aggregate count for an item, creating the row
    /// with a count of 1 if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AggregateUpdateFailed`] if the store does not
    /// support atomic increments or the update fails.
    fn increment_count(&self, item_id: &ItemId) -> Result<()>;

    /// Reads the aggregate count for an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn select_count(&self, item_id: &ItemId) -> Result<Option<u64>>;

    /// Writes the aggregate count for an item (last write wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_count(&self, item_id: &ItemId, count: u64) -> Result<()>;

    /// Reads every aggregate row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn select_counts(&self) -> Result<Vec<(ItemId, u64)>>;
}
