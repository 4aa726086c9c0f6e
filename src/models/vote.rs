//! Voter identities, vote records and aggregates.

use super::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque token identifying a browser or session for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    /// Creates a new voter ID from the given string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VoterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VoterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Durable fact that one identity voted for one item.
///
/// At most one record exists per `(voter_id, item_id)` pair. Records are
/// created on a successful vote and never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// The visitor who voted.
    pub voter_id: VoterId,
    /// The item voted for.
    pub item_id: ItemId,
    /// Creation time (Unix milliseconds).
    pub created_at: u64,
}

impl VoteRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(voter_id: VoterId, item_id: ItemId) -> Self {
        Self {
            voter_id,
            item_id,
            created_at: crate::current_timestamp_millis(),
        }
    }
}

/// Per-item vote tally.
///
/// Items without an entry have a count of zero. Serialises as a JSON object
/// keyed by item id, e.g. `{"1": 5, "2": 3}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteCounts(BTreeMap<ItemId, u64>);

impl VoteCounts {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count for an item (0 when absent).
    #[must_use]
    pub fn get(&self, item: &ItemId) -> u64 {
        self.0.get(item).copied().unwrap_or(0)
    }

    /// Increments the count for an item and returns the new value.
    pub fn increment(&mut self, item: &ItemId) -> u64 {
        let count = self.0.entry(item.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Iterates over `(item, count)` pairs in item id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, u64)> {
        self.0.iter().map(|(item, count)| (item, *count))
    }

    /// Number of items with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no item has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().fold(0, |acc, c| acc.saturating_add(*c))
    }
}

impl FromIterator<(ItemId, u64)> for VoteCounts {
    fn from_iter<T: IntoIterator<Item = (ItemId, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Set of items the current client has successfully voted for.
///
/// Source of truth for disabling a vote control. Serialises as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VotedItems(BTreeSet<ItemId>);

impl VotedItems {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the item has been voted for.
    #[must_use]
    pub fn contains(&self, item: &ItemId) -> bool {
        self.0.contains(item)
    }

    /// Adds an item; returns false if it was already present.
    pub fn insert(&mut self, item: ItemId) -> bool {
        self.0.insert(item)
    }

    /// Iterates over voted items.
    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.0.iter()
    }

    /// Number of voted items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing has been voted for.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ItemId> for VotedItems {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
