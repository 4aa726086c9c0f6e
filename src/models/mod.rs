//! Data models for manifesto votes.
//!
//! This module contains the core data structures shared by the vote store,
//! the HTTP API and the client controller.

mod item;
mod vote;

pub use item::ItemId;
pub use vote::{VoteCounts, VoteRecord, VotedItems, VoterId};
