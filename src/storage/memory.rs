//! In-memory vote backend.
//!
//! Useful for tests and throwaway servers. Uniqueness is enforced by inserting
//! into a map under the same lock that checks for the key, so concurrent
//! inserts of the same pair still produce exactly one record.

use crate::models::{ItemId, VoteRecord, VoterId};
use crate::storage::acquire_lock;
use crate::storage::traits::VoteBackend;
use crate::{Error, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    records: HashMap<(VoterId, ItemId), VoteRecord>,
    counts: HashMap<ItemId, u64>,
}

/// In-memory vote backend.
pub struct MemoryVoteBackend {
    state: Mutex<MemoryState>,
    atomic_increment: bool,
}

impl MemoryVoteBackend {
    /// Creates an empty backend with atomic increments enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            atomic_increment: true,
        }
    }

    /// Enables or disables the atomic increment operation.
    ///
    /// When disabled, `increment_count` fails and the ledger takes the
    /// read-modify-write path.
    #[must_use]
    pub const fn with_atomic_increment(mut self, enabled: bool) -> Self {
        self.atomic_increment = enabled;
        self
    }

    /// Number of stored vote records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        acquire_lock(&self.state).records.len()
    }
}

impl Default for MemoryVoteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteBackend for MemoryVoteBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn find_vote(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<Option<VoteRecord>> {
        let state = acquire_lock(&self.state);
        Ok(state
            .records
            .get(&(voter_id.clone(), item_id.clone()))
            .cloned())
    }

    fn insert_vote(&self, record: &VoteRecord) -> Result<()> {
        let mut state = acquire_lock(&self.state);
        match state
            .records
            .entry((record.voter_id.clone(), record.item_id.clone()))
        {
            Entry::Occupied(_) => Err(Error::AlreadyVoted {
                voter_id: record.voter_id.to_string(),
                item_id: record.item_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            },
        }
    }

    fn increment_count(&self, item_id: &ItemId) -> Result<()> {
        if !self.atomic_increment {
            return Err(Error::AggregateUpdateFailed {
                item_id: item_id.to_string(),
                cause: "atomic increment not supported by this store".to_string(),
            });
        }
        let mut state = acquire_lock(&self.state);
        let count = state.counts.entry(item_id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(())
    }

    fn select_count(&self, item_id: &ItemId) -> Result<Option<u64>> {
        Ok(acquire_lock(&self.state).counts.get(item_id).copied())
    }

    fn upsert_count(&self, item_id: &ItemId, count: u64) -> Result<()> {
        acquire_lock(&self.state)
            .counts
            .insert(item_id.clone(), count);
        Ok(())
    }

    fn select_counts(&self) -> Result<Vec<(ItemId, u64)>> {
        let state = acquire_lock(&self.state);
        Ok(state
            .counts
            .iter()
            .map(|(item, count)| (item.clone(), *count))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_insert_duplicate_pair_fails() {
        let backend = MemoryVoteBackend::new();
        let record = VoteRecord::new(VoterId::new("v"), ItemId::new("1"));
        backend.insert_vote(&record).unwrap();
        let err = backend.insert_vote(&record).unwrap_err();
        assert!(err.is_already_voted());
        assert_eq!(backend.record_count(), 1);
    }

    #[test]
    fn test_same_voter_different_items() {
        let backend = MemoryVoteBackend::new();
        let voter = VoterId::new("v");
        backend
            .insert_vote(&VoteRecord::new(voter.clone(), ItemId::new("1")))
            .unwrap();
        backend
            .insert_vote(&VoteRecord::new(voter.clone(), ItemId::new("2")))
            .unwrap();
        assert!(backend.find_vote(&voter, &ItemId::new("2")).unwrap().is_some());
        assert!(backend.find_vote(&voter, &ItemId::new("3")).unwrap().is_none());
    }

    #[test]
    fn test_increment_disabled() {
        let backend = MemoryVoteBackend::new().with_atomic_increment(false);
        let err = backend.increment_count(&ItemId::new("1")).unwrap_err();
        assert!(matches!(err, Error::AggregateUpdateFailed { .. }));
    }

    #[test]
    fn test_concurrent_inserts_of_one_pair() {
        let backend = Arc::new(MemoryVoteBackend::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    backend
                        .insert_vote(&VoteRecord::new(VoterId::new("v"), ItemId::new("1")))
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(backend.record_count(), 1);
    }
}
