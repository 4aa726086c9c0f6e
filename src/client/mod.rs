//! Client core: what a manifesto page runs.
//!
//! A [`VotingController`] owns the per-item vote states, the optimistic
//! counts and the display order. It reaches the store through a
//! [`VoteGateway`] and remembers what this client voted for in a
//! [`ClientStorage`].

mod controller;
mod gateway;
pub mod ranking;
mod storage;

pub use controller::{ItemView, VOTE_FAILED_MESSAGE, VoteOutcome, VoteState, VoteTicket, VotingController};
pub use gateway::{DEFAULT_HTTP_TIMEOUT, DirectGateway, HttpVoteGateway, SessionVoteGateway, VoteGateway};
pub use storage::{
    ClientStorage, FileClientStorage, LOCAL_COUNTS_KEY, MemoryClientStorage, VISITOR_ID_KEY,
    VOTED_ITEMS_KEY, load_json, load_local_counts, load_voted_items, save_json,
};
