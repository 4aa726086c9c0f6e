//! Storage backend traits.

mod backend;
mod store;

pub use backend::VoteBackend;
pub use store::VoteStore;
