//! CLI command implementations.
//!
//! Each submodule implements one command. Commands write their output to a
//! caller-supplied writer so the binary owns stdout.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Run the HTTP vote API |
//! | `counts` | Print current counts from the store, in display order |
//! | `vote` | Vote for an item through the API or the local session store |
//! | `config` | Show the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Serve the API on port 3000 with an in-memory store
//! MANIFESTO_VOTES_STORAGE_BACKEND=memory manifesto-votes serve --port 3000
//!
//! # Vote for item 3 as this machine's visitor
//! manifesto-votes vote 3
//!
//! # Vote without a server
//! manifesto-votes vote 3 --local
//! ```

mod config;
mod counts;
mod serve;
mod vote;

pub use config::run_config;
pub use counts::{render_counts, run_counts};
pub use serve::run_serve;
pub use vote::{VoteMode, render_outcome, run_vote};

use crate::{Error, Result};
use std::io::Write;

/// Writes a line to the command output.
pub(crate) fn write_line(out: &mut impl Write, line: &str) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    })
}
