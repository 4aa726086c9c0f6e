//! Vote store trait.

use crate::Result;
use crate::models::{ItemId, VoteCounts, VoterId};
use crate::storage::RecordOutcome;

/// Contract exposed to the vote API and in-process clients, regardless of the
/// backing implementation.
pub trait VoteStore: Send + Sync {
    /// Returns every item with at least one vote.
    ///
    /// Items with zero votes may be absent; callers treat them as 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregate table cannot be read.
    fn all_counts(&self) -> Result<VoteCounts>;

    /// Returns true if the voter already has a record for the item.
    ///
    /// This is an optimisation for callers; it is not a correctness
    /// guarantee against concurrent submissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the vote-record table cannot be read.
    fn has_voted(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<bool>;

    /// Records a vote and increments the item's aggregate count by one.
    ///
    /// Once the record is inserted the vote is committed, even if the
    /// aggregate update fails afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AlreadyVoted`] if the pair already exists, or
    /// an error if the record cannot be inserted.
    fn record_vote(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<RecordOutcome>;
}
