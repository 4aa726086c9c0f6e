//! Voting controller: per-item state machine over a gateway.
//!
//! ```text
//!            begin_vote             Ok / AlreadyVoted
//! Unvoted ───────────────▶ Submitting ─────────────────▶ Voted
//!    ▲                         │
//!    └─────── other error ─────┘
//! ```
//!
//! Each item is guarded on its own: while one item is `Submitting`, other
//! items can still begin votes. Counts are optimistic; the controller adds one
//! locally on success instead of refetching.

use crate::Result;
use crate::client::gateway::VoteGateway;
use crate::client::ranking;
use crate::client::storage::{ClientStorage, VOTED_ITEMS_KEY, load_voted_items, save_json};
use crate::models::{ItemId, VoteCounts, VotedItems};
use crate::storage::acquire_lock;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Message shown to the user when a vote fails.
pub const VOTE_FAILED_MESSAGE: &str = "Failed to submit vote. Please try again.";

/// Interaction state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    /// The vote control is enabled.
    Unvoted,
    /// A submission is in flight; the control is disabled.
    Submitting,
    /// The client has voted; the control is disabled for good.
    Voted,
}

/// Proof that an item moved to `Submitting`; redeemed by
/// [`VotingController::complete_vote`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a ticket left unredeemed keeps its item in Submitting"]
pub struct VoteTicket {
    item_id: ItemId,
}

impl VoteTicket {
    /// The item being voted for.
    #[must_use]
    pub const fn item_id(&self) -> &ItemId {
        &self.item_id
    }
}

/// Result of a completed vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The store counted the vote; `count` is the new local count.
    Counted {
        /// Count after the optimistic increment.
        count: u64,
    },
    /// The store already had this vote; the item is marked voted, count unchanged.
    AlreadyCounted,
    /// The vote failed; the item is interactive again.
    Failed {
        /// User-facing message.
        message: String,
    },
}

/// One row of the rendered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    /// Item id.
    pub item_id: ItemId,
    /// Current count.
    pub count: u64,
    /// Interaction state.
    pub state: VoteState,
}

struct ControllerState {
    states: HashMap<ItemId, VoteState>,
    counts: VoteCounts,
    voted: VotedItems,
    ranking: Vec<ItemId>,
}

/// Client-side voting controller.
pub struct VotingController<G: VoteGateway, S: ClientStorage> {
    gateway: G,
    storage: S,
    items: Vec<ItemId>,
    state: Mutex<ControllerState>,
}

impl<G: VoteGateway, S: ClientStorage> VotingController<G, S> {
    /// Loads the controller for `items` (document order; duplicates dropped).
    ///
    /// Reads the voted set from `storage`, then fetches counts. A fetch failure
    /// is logged and the page starts from zero counts.
    pub async fn load(items: Vec<ItemId>, gateway: G, storage: S) -> Self {
        let mut seen = HashSet::new();
        let items: Vec<ItemId> = items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect();

        let voted = load_voted_items(&storage);
        let counts = match gateway.fetch_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load votes; starting from zero");
                VoteCounts::new()
            },
        };

        let states = items
            .iter()
            .map(|item| {
                let state = if voted.contains(item) {
                    VoteState::Voted
                } else {
                    VoteState::Unvoted
                };
                (item.clone(), state)
            })
            .collect();
        let ranking = ranking::rank(&items, &counts);

        tracing::debug!(
            items = items.len(),
            voted = voted.len(),
            total_votes = counts.total(),
            "Voting controller loaded"
        );

        Self {
            gateway,
            storage,
            items,
            state: Mutex::new(ControllerState {
                states,
                counts,
                voted,
                ranking,
            }),
        }
    }

    /// Moves `item_id` to `Submitting` if it can take a vote.
    ///
    /// Returns `None` (and changes nothing) for unknown items, items already
    /// voted for, and items with a submission in flight.
    pub fn begin_vote(&self, item_id: &ItemId) -> Option<VoteTicket> {
        let mut state = acquire_lock(&self.state);
        if state.voted.contains(item_id) {
            tracing::debug!(item_id = %item_id, "Vote ignored: already voted");
            return None;
        }
        let Some(current) = state.states.get_mut(item_id) else {
            tracing::debug!(item_id = %item_id, "Vote ignored: unknown item");
            return None;
        };
        if *current != VoteState::Unvoted {
            tracing::debug!(item_id = %item_id, state = ?current, "Vote ignored: not interactive");
            return None;
        }
        *current = VoteState::Submitting;
        Some(VoteTicket {
            item_id: item_id.clone(),
        })
    }

    /// Applies the gateway's answer for a ticket.
    pub fn complete_vote(&self, ticket: VoteTicket, result: Result<()>) -> VoteOutcome {
        let VoteTicket { item_id } = ticket;
        let mut state = acquire_lock(&self.state);

        let outcome = match result {
            Ok(()) => VoteOutcome::Counted {
                count: state.counts.increment(&item_id),
            },
            Err(e) if e.is_already_voted() => VoteOutcome::AlreadyCounted,
            Err(e) => {
                tracing::warn!(item_id = %item_id, error = %e, "Error submitting vote");
                state.states.insert(item_id, VoteState::Unvoted);
                return VoteOutcome::Failed {
                    message: VOTE_FAILED_MESSAGE.to_string(),
                };
            },
        };

        state.voted.insert(item_id.clone());
        state.states.insert(item_id.clone(), VoteState::Voted);
        if let Err(e) = save_json(&self.storage, VOTED_ITEMS_KEY, &state.voted) {
            tracing::warn!(error = %e, "Failed to save voted items");
        }
        state.ranking = ranking::rank(&self.items, &state.counts);

        tracing::info!(item_id = %item_id, outcome = ?outcome, "Vote completed");
        outcome
    }

    /// Votes for `item_id`: begin, submit through the gateway, complete.
    ///
    /// Returns `None` when the item cannot take a vote right now.
    pub async fn vote(&self, item_id: &ItemId) -> Option<VoteOutcome> {
        let ticket = self.begin_vote(item_id)?;
        let result = self.gateway.submit_vote(ticket.item_id()).await;
        Some(self.complete_vote(ticket, result))
    }

    /// State of an item, or `None` if the item is not on the page.
    pub fn state(&self, item_id: &ItemId) -> Option<VoteState> {
        acquire_lock(&self.state).states.get(item_id).copied()
    }

    /// Current count of an item.
    pub fn count(&self, item_id: &ItemId) -> u64 {
        acquire_lock(&self.state).counts.get(item_id)
    }

    /// Snapshot of all counts.
    pub fn counts(&self) -> VoteCounts {
        acquire_lock(&self.state).counts.clone()
    }

    /// Snapshot of the voted set.
    pub fn voted_items(&self) -> VotedItems {
        acquire_lock(&self.state).voted.clone()
    }

    /// Items in display order.
    pub fn ranking(&self) -> Vec<ItemId> {
        acquire_lock(&self.state).ranking.clone()
    }

    /// Items in document order.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// The gateway this controller submits through.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Every item with its count and state, in display order.
    pub fn snapshot(&self) -> Vec<ItemView> {
        let state = acquire_lock(&self.state);
        state
            .ranking
            .iter()
            .map(|item| ItemView {
                item_id: item.clone(),
                count: state.counts.get(item),
                state: state
                    .states
                    .get(item)
                    .copied()
                    .unwrap_or(VoteState::Unvoted),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::client::storage::MemoryClientStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway with canned counts that answers every submit with `answer`.
    struct StubGateway {
        counts: Option<VoteCounts>,
        answer: fn(&ItemId) -> Result<()>,
        submits: AtomicUsize,
    }

    impl StubGateway {
        fn new(answer: fn(&ItemId) -> Result<()>) -> Self {
            Self {
                counts: Some(VoteCounts::new()),
                answer,
                submits: AtomicUsize::new(0),
            }
        }
    }

    impl VoteGateway for StubGateway {
        async fn fetch_counts(&self) -> Result<VoteCounts> {
            self.counts.clone().ok_or_else(|| Error::OperationFailed {
                operation: "fetch_counts".to_string(),
                cause: "offline".to_string(),
            })
        }

        async fn submit_vote(&self, item_id: &ItemId) -> Result<()> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            (self.answer)(item_id)
        }
    }

    fn accept(_: &ItemId) -> Result<()> {
        Ok(())
    }

    fn already(item_id: &ItemId) -> Result<()> {
        Err(Error::AlreadyVoted {
            voter_id: "v".to_string(),
            item_id: item_id.to_string(),
        })
    }

    fn unavailable(_: &ItemId) -> Result<()> {
        Err(Error::OperationFailed {
            operation: "submit_vote".to_string(),
            cause: "500".to_string(),
        })
    }

    fn items() -> Vec<ItemId> {
        ["1", "2", "3"].into_iter().map(ItemId::new).collect()
    }

    #[tokio::test]
    async fn test_successful_vote_counts_and_persists() {
        let controller =
            VotingController::load(items(), StubGateway::new(accept), MemoryClientStorage::new())
                .await;
        let item = ItemId::new("2");

        let outcome = controller.vote(&item).await;
        assert_eq!(outcome, Some(VoteOutcome::Counted { count: 1 }));
        assert_eq!(controller.state(&item), Some(VoteState::Voted));
        assert_eq!(controller.ranking()[0], item);
        assert_eq!(
            controller.storage.get(VOTED_ITEMS_KEY).unwrap().as_deref(),
            Some(r#"["2"]"#)
        );
    }

    #[tokio::test]
    async fn test_already_voted_marks_voted_without_count() {
        let controller =
            VotingController::load(items(), StubGateway::new(already), MemoryClientStorage::new())
                .await;
        let item = ItemId::new("1");

        assert_eq!(
            controller.vote(&item).await,
            Some(VoteOutcome::AlreadyCounted)
        );
        assert_eq!(controller.count(&item), 0);
        assert_eq!(controller.state(&item), Some(VoteState::Voted));
        assert!(controller.voted_items().contains(&item));
    }

    #[tokio::test]
    async fn test_failure_reenables_item() {
        let controller = VotingController::load(
            items(),
            StubGateway::new(unavailable),
            MemoryClientStorage::new(),
        )
        .await;
        let item = ItemId::new("3");

        let outcome = controller.vote(&item).await;
        assert_eq!(
            outcome,
            Some(VoteOutcome::Failed {
                message: VOTE_FAILED_MESSAGE.to_string()
            })
        );
        assert_eq!(controller.state(&item), Some(VoteState::Unvoted));
        assert_eq!(controller.count(&item), 0);
        assert!(controller.voted_items().is_empty());
    }

    #[tokio::test]
    async fn test_guards_block_submission() {
        let controller =
            VotingController::load(items(), StubGateway::new(accept), MemoryClientStorage::new())
                .await;
        let item = ItemId::new("1");

        let ticket = controller.begin_vote(&item).unwrap();
        assert_eq!(ticket.item_id(), &item);
        assert_eq!(controller.state(&item), Some(VoteState::Submitting));
        assert!(controller.begin_vote(&item).is_none());
        assert!(controller.vote(&item).await.is_none());
        assert!(controller.begin_vote(&ItemId::new("99")).is_none());

        let other = controller.begin_vote(&ItemId::new("2"));
        assert!(other.is_some());

        controller.complete_vote(ticket, Ok(()));
        assert!(controller.vote(&item).await.is_none());
        assert_eq!(controller.gateway().submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_failure_starts_from_zero() {
        let mut gateway = StubGateway::new(accept);
        gateway.counts = None;
        let controller = VotingController::load(items(), gateway, MemoryClientStorage::new()).await;

        assert!(controller.counts().is_empty());
        assert_eq!(controller.ranking(), items());
    }

    #[tokio::test]
    async fn test_load_applies_voted_set_and_ranking() {
        let storage = MemoryClientStorage::new();
        storage.set(VOTED_ITEMS_KEY, r#"["3"]"#).unwrap();
        let mut gateway = StubGateway::new(accept);
        gateway.counts = Some(
            [(ItemId::new("3"), 4), (ItemId::new("1"), 4)]
                .into_iter()
                .collect(),
        );

        let mut with_duplicate = items();
        with_duplicate.push(ItemId::new("1"));
        let controller = VotingController::load(with_duplicate, gateway, storage).await;

        assert_eq!(controller.items(), items().as_slice());
        let snapshot = controller.snapshot();
        let order: Vec<_> = snapshot.iter().map(|v| v.item_id.as_str()).collect();
        assert_eq!(order, ["1", "3", "2"]);
        assert_eq!(snapshot[1].state, VoteState::Voted);
        assert_eq!(snapshot[1].count, 4);
        assert!(controller.vote(&ItemId::new("3")).await.is_none());
    }
}
