//! Serve command: run the HTTP vote API.

use crate::Result;
use crate::config::VotesConfig;
use crate::storage::open_store;

/// Opens the configured store and serves the API until ctrl-c.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the server fails.
pub async fn run_serve(config: &VotesConfig) -> Result<()> {
    let store = open_store(&config.storage)?;
    crate::api::serve(config, store).await
}
