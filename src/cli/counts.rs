//! Counts command: print the store's counts in display order.

use super::write_line;
use crate::Result;
use crate::client::ranking;
use crate::config::VotesConfig;
use crate::models::{ItemId, VoteCounts};
use crate::storage::open_store;
use std::collections::BTreeSet;
use std::io::Write;

/// Reads counts from the configured store and prints them ranked.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or read.
pub fn run_counts(config: &VotesConfig, out: &mut impl Write) -> Result<()> {
    let store = open_store(&config.storage)?;
    let counts = store.all_counts()?;
    for line in render_counts(&config.client.items, &counts) {
        write_line(out, &line)?;
    }
    Ok(())
}

/// Renders a ranked table of `items` plus every item that has votes.
#[must_use]
pub fn render_counts(items: &[ItemId], counts: &VoteCounts) -> Vec<String> {
    let mut seen: BTreeSet<&ItemId> = items.iter().collect();
    let mut all: Vec<ItemId> = items.to_vec();
    all.extend(
        counts
            .iter()
            .filter(|(item, _)| seen.insert(*item))
            .map(|(item, _)| item.clone()),
    );

    if all.is_empty() {
        return vec!["No votes yet".to_string()];
    }

    let width = all.iter().map(|item| item.as_str().len()).max().unwrap_or(0).max(4);
    let mut lines = vec![format!("{:>4}  {:<width$}  {:>5}", "RANK", "ITEM", "VOTES")];
    lines.extend(
        ranking::rank(&all, counts)
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!("{:>4}  {:<width$}  {:>5}", i + 1, item.as_str(), counts.get(item))
            }),
    );
    lines
}
