//! Vote storage.
//!
//! Two layers:
//! - [`VoteBackend`]: row-level operations against the hosted tables
//!   (`SQLite` or in-memory)
//! - [`VoteStore`]: the contract handlers and gateways use, implemented by
//!   [`LedgerVoteStore`] over any backend

// Dropping the connection guard slightly earlier buys nothing here.
#![allow(clippy::significant_drop_tightening)]

mod ledger;
mod memory;
pub mod sqlite;
pub mod traits;

pub use ledger::{AggregatePath, LedgerVoteStore, RecordOutcome};
pub use memory::MemoryVoteBackend;
pub use sqlite::{SqliteVoteBackend, acquire_lock};
pub use traits::{VoteBackend, VoteStore};

use crate::config::StorageConfig;
use crate::{Error, Result};
use std::sync::Arc;

/// Backend type for the vote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendType {
    /// `SQLite` database.
    #[default]
    Sqlite,
    /// Process-local maps; contents are lost on exit.
    Memory,
}

impl StorageBackendType {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "in-memory" | "in_memory" => Ok(Self::Memory),
            other => Err(Error::InvalidInput(format!(
                "unknown storage backend '{other}' (expected sqlite or memory)"
            ))),
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StorageBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens the vote store described by `config`.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened or initialized.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn VoteStore>> {
    let store: Arc<dyn VoteStore> = match config.backend {
        StorageBackendType::Sqlite => {
            let backend = SqliteVoteBackend::new(&config.database_path)?
                .with_atomic_increment(config.atomic_increment);
            Arc::new(LedgerVoteStore::new(backend))
        },
        StorageBackendType::Memory => {
            let backend = MemoryVoteBackend::new().with_atomic_increment(config.atomic_increment);
            Arc::new(LedgerVoteStore::new(backend))
        },
    };

    tracing::info!(
        backend = %config.backend,
        path = %config.database_path.display(),
        atomic_increment = config.atomic_increment,
        "Vote store opened"
    );
    Ok(store)
}
