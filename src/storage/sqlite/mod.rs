//! `SQLite` vote backend and shared connection utilities.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition with poison recovery, connection configuration
//! - [`metrics`]: per-operation metrics recording
//! - [`backend`]: [`SqliteVoteBackend`], the row-level store

mod backend;
mod connection;
mod metrics;

pub use backend::SqliteVoteBackend;
pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection, open_connection};
pub use metrics::{record_operation_metrics, timed};
