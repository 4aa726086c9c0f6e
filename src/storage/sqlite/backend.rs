//! `SQLite` vote backend.
//!
//! Stores vote records in `visitor_votes` and aggregates in `votes`.
//!
//! ```text
//! visitor_votes(visitor_id, item_id, created_at, UNIQUE(visitor_id, item_id))
//! votes(item_id PRIMARY KEY, count)
//! ```

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use super::connection::{acquire_lock, configure_connection, open_connection};
use super::metrics::timed;
use crate::models::{ItemId, VoteRecord, VoterId};
use crate::storage::traits::VoteBackend;
use crate::{Error, Result};

const BACKEND: &str = "sqlite";

/// SQLite-based vote backend.
pub struct SqliteVoteBackend {
    /// Database connection (mutex for interior mutability).
    conn: Mutex<Connection>,
    /// Whether `increment_count` is available.
    atomic_increment: bool,
}

impl SqliteVoteBackend {
    /// Opens (or creates) a vote database at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = open_connection(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory vote database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_vote_database_memory".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let backend = Self {
            conn: Mutex::new(conn),
            atomic_increment: true,
        };
        backend.initialize_schema()?;
        Ok(backend)
    }

    /// Enables or disables the atomic increment operation.
    ///
    /// Disabling it models a hosted store without an increment procedure; the
    /// ledger then falls back to read-modify-write.
    #[must_use]
    pub const fn with_atomic_increment(mut self, enabled: bool) -> Self {
        self.atomic_increment = enabled;
        self
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            r"
            -- One row per (visitor, item); the constraint is the authority on duplicates
            CREATE TABLE IF NOT EXISTS visitor_votes (
                visitor_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(visitor_id, item_id)
            );

            CREATE INDEX IF NOT EXISTS idx_visitor_votes_item ON visitor_votes(item_id);

            -- Aggregate count per item
            CREATE TABLE IF NOT EXISTS votes (
                item_id TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0)
            );
            ",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "initialize_vote_schema".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }

    /// Counts vote records for an item straight from the record table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self, item_id: &ItemId) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM visitor_votes WHERE item_id = ?1",
                params![item_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "count_records".to_string(),
                cause: e.to_string(),
            })?;
        Ok(from_db_count(count))
    }
}

/// Converts an `SQLite` count back to u64 (the schema forbids negatives).
fn from_db_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Converts u64 to i64 for `SQLite` storage, saturating.
fn to_db_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl VoteBackend for SqliteVoteBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn find_vote(&self, voter_id: &VoterId, item_id: &ItemId) -> Result<Option<VoteRecord>> {
        timed(BACKEND, "find_vote", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                "SELECT visitor_id, item_id, created_at FROM visitor_votes
                 WHERE visitor_id = ?1 AND item_id = ?2",
                params![voter_id.as_str(), item_id.as_str()],
                |row| {
                    Ok(VoteRecord {
                        voter_id: VoterId::new(row.get::<_, String>(0)?),
                        item_id: ItemId::new(row.get::<_, String>(1)?),
                        created_at: from_db_count(row.get(2)?),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "find_vote".to_string(),
                cause: e.to_string(),
            })
        })
    }

    fn insert_vote(&self, record: &VoteRecord) -> Result<()> {
        timed(BACKEND, "insert_vote", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO visitor_votes (visitor_id, item_id, created_at) VALUES (?1, ?2, ?3)",
                params![
                    record.voter_id.as_str(),
                    record.item_id.as_str(),
                    to_db_count(record.created_at),
                ],
            )
            .map_err(|e| {
                if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
                    Error::AlreadyVoted {
                        voter_id: record.voter_id.to_string(),
                        item_id: record.item_id.to_string(),
                    }
                } else {
                    Error::OperationFailed {
                        operation: "insert_vote".to_string(),
                        cause: e.to_string(),
                    }
                }
            })?;
            Ok(())
        })
    }

    fn increment_count(&self, item_id: &ItemId) -> Result<()> {
        if !self.atomic_increment {
            return Err(Error::AggregateUpdateFailed {
                item_id: item_id.to_string(),
                cause: "atomic increment disabled for this store".to_string(),
            });
        }

        timed(BACKEND, "increment_count", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO votes (item_id, count) VALUES (?1, 1)
                 ON CONFLICT(item_id) DO UPDATE SET count = count + 1",
                params![item_id.as_str()],
            )
            .map_err(|e| Error::AggregateUpdateFailed {
                item_id: item_id.to_string(),
                cause: e.to_string(),
            })?;
            Ok(())
        })
    }

    fn select_count(&self, item_id: &ItemId) -> Result<Option<u64>> {
        timed(BACKEND, "select_count", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                "SELECT count FROM votes WHERE item_id = ?1",
                params![item_id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|count| count.map(from_db_count))
            .map_err(|e| Error::OperationFailed {
                operation: "select_count".to_string(),
                cause: e.to_string(),
            })
        })
    }

    fn upsert_count(&self, item_id: &ItemId, count: u64) -> Result<()> {
        timed(BACKEND, "upsert_count", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO votes (item_id, count) VALUES (?1, ?2)
                 ON CONFLICT(item_id) DO UPDATE SET count = excluded.count",
                params![item_id.as_str(), to_db_count(count)],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "upsert_count".to_string(),
                cause: e.to_string(),
            })?;
            Ok(())
        })
    }

    fn select_counts(&self) -> Result<Vec<(ItemId, u64)>> {
        timed(BACKEND, "select_counts", || {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare("SELECT item_id, count FROM votes")
                .map_err(|e| Error::OperationFailed {
                    operation: "prepare_select_counts".to_string(),
                    cause: e.to_string(),
                })?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        ItemId::new(row.get::<_, String>(0)?),
                        from_db_count(row.get(1)?),
                    ))
                })
                .map_err(|e| Error::OperationFailed {
                    operation: "select_counts".to_string(),
                    cause: e.to_string(),
                })?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::OperationFailed {
                    operation: "select_counts".to_string(),
                    cause: e.to_string(),
                })
        })
    }
}
