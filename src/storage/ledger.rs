//! Vote ledger: the de-duplication and aggregation protocol.
//!
//! [`LedgerVoteStore`] turns a row-level [`VoteBackend`] into a [`VoteStore`]:
//!
//! 1. Look for an existing record. This is an optimisation only; it saves a
//!    failed insert in the common repeat-click case.
//! 2. Insert the vote record. The backend's uniqueness constraint is the
//!    authority on duplicates; a violation surfaces as `AlreadyVoted`.
//! 3. Increment the aggregate count atomically.
//! 4. If the atomic increment fails, fall back to read-modify-write: read the
//!    count, add one, upsert it keyed by item id.
//!
//! # Known race
//!
//! The fallback is not atomic. Two writers can both read `n` and both write
//! `n + 1`, losing a vote from the aggregate (the vote records themselves are
//! intact). This is accepted degraded behaviour; the aggregate is eventually
//! repairable from the record table but nothing here does so.
//!
//! When the fallback read fails too, the aggregate is left untouched instead
//! of being upserted to 1. A read error says nothing about the stored count,
//! and writing 1 over a count of `n` would lose `n - 1` votes.

use crate::models::{ItemId, VoteCounts, VoteRecord, VoterId};
use crate::storage::traits::{VoteBackend, VoteStore};
use crate::{Error, Result};

/// Which path updated the aggregate count after a vote was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatePath {
    /// The atomic increment succeeded.
    Atomic,
    /// The atomic increment failed; read-modify-write succeeded.
    Fallback,
    /// Both paths failed; the aggregate was not updated.
    Skipped,
}

impl AggregatePath {
    /// Returns the path as a metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Fallback => "fallback",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of a successful [`VoteStore::record_vote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The committed vote record.
    pub record: VoteRecord,
    /// How the aggregate was updated.
    pub aggregate: AggregatePath,
}

/// Vote store implementing the ledger protocol over a [`VoteBackend`].
pub struct LedgerVoteStore<B: VoteBackend> {
    backend: B,
}

impl<B: VoteBackend> LedgerVoteStore<B> {
    /// Creates a ledger over the given backend.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns a reference to the backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Read-modify-write increment. Last write wins.
    fn fallback_increment(&self, item_id: &ItemId) -> Result<u64> {
        let current = self.backend.select_count(item_id)?.unwrap_or(0);
        let next = current.saturating_add(1);
        self.backend.upsert_count(item_id, next)?;
        Ok(next)
    }

    fn update_aggregate(&self, item_id: &ItemId) -> AggregatePath {
        let backend = self.backend.backend_name();
        let Err(atomic_err) = self.backend.increment_count(item_id) else {
            return AggregatePath::Atomic;
        };

        tracing::warn!(
            backend,
            item_id = %item_id,
            error = %atomic_err,
            "Atomic increment failed, falling back to read-modify-write"
        );
        metrics::counter!("vote_aggregate_fallback_total", "backend" => backend).increment(1);

        match self.fallback_increment(item_id) {
            Ok(count) => {
                tracing::debug!(backend, item_id = %item_id, count, "Fallback increment applied");
                AggregatePath::Fallback
            },
            Err(e) => {
                tracing::error!(
                    backend,
                    item_id = %item_id,
                    error = %e,
                    "Fallback increment failed; aggregate not updated"
                );
                metrics::counter!("vote_aggregate_skipped_total", "backend" => backend)
                    .increment(1);
                AggregatePath::Skipped
            },
        }
    }
}

impl<B: VoteBackend> VoteStore for LedgerVoteStore<B> {
    fn all_counts(&self) -> Result<VoteCounts> {
        Ok(self.backend.select_counts()?.into_iter().collect())
    }

    fn has_voted(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<bool> {
        Ok(self.backend.find_vote(voter_id, item_id)?.is_some())
    }

    fn record_vote(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<RecordOutcome> {
        if item_id.is_blank() {
            return Err(Error::InvalidInput("itemId is required".to_string()));
        }

        let backend = self.backend.backend_name();
        if self.backend.find_vote(voter_id, item_id)?.is_some() {
            metrics::counter!("votes_rejected_total", "backend" => backend, "reason" => "already_voted")
                .increment(1);
            return Err(Error::AlreadyVoted {
                voter_id: voter_id.to_string(),
                item_id: item_id.to_string(),
            });
        }

        let record = VoteRecord::new(voter_id.clone(), item_id.clone());
        if let Err(e) = self.backend.insert_vote(&record) {
            let reason = if e.is_already_voted() {
                "already_voted"
            } else {
                "store_error"
            };
            metrics::counter!("votes_rejected_total", "backend" => backend, "reason" => reason)
                .increment(1);
            return Err(e);
        }

        let aggregate = self.update_aggregate(item_id);
        metrics::counter!(
            "votes_recorded_total",
            "backend" => backend,
            "aggregate" => aggregate.as_str()
        )
        .increment(1);
        tracing::info!(
            backend,
            voter_id = %voter_id,
            item_id = %item_id,
            aggregate = aggregate.as_str(),
            "Vote recorded"
        );

        Ok(RecordOutcome { record, aggregate })
    }
}
