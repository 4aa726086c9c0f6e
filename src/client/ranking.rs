//! Display ordering of items.
//!
//! Items sort by vote count, highest first; ties keep document order, which
//! for manifesto items is their numeric id. Ids that are not numbers sort
//! after every numeric id, lexicographically among themselves, so the order
//! is total for any input.

use crate::models::{ItemId, VoteCounts};
use std::cmp::Ordering;

/// Compares two items for display: count descending, then id ascending.
#[must_use]
pub fn compare(a: &ItemId, b: &ItemId, counts: &VoteCounts) -> Ordering {
    counts
        .get(b)
        .cmp(&counts.get(a))
        .then_with(|| compare_ids(a, b))
}

fn compare_ids(a: &ItemId, b: &ItemId) -> Ordering {
    match (a.numeric(), b.numeric()) {
        // "3" and "03" are numerically equal; fall back to the text
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.as_str().cmp(b.as_str())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.as_str().cmp(b.as_str()),
    }
}

/// Returns `items` in display order.
#[must_use]
pub fn rank(items: &[ItemId], counts: &VoteCounts) -> Vec<ItemId> {
    let mut ranked = items.to_vec();
    ranked.sort_by(|a, b| compare(a, b, counts));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().copied().map(ItemId::new).collect()
    }

    fn counts(raw: &[(&str, u64)]) -> VoteCounts {
        raw.iter()
            .map(|(id, count)| (ItemId::new(*id), *count))
            .collect()
    }

    #[test]
    fn test_rank_by_count_then_id() {
        let ranked = rank(
            &ids(&["1", "2", "3", "4"]),
            &counts(&[("1", 2), ("2", 5), ("3", 2)]),
        );
        assert_eq!(ranked, ids(&["2", "1", "3", "4"]));
    }

    #[test]
    fn test_ties_use_numeric_not_lexicographic_order() {
        let ranked = rank(&ids(&["10", "9", "2"]), &VoteCounts::new());
        assert_eq!(ranked, ids(&["2", "9", "10"]));
    }

    #[test]
    fn test_non_numeric_ids_sort_after_numeric() {
        let ranked = rank(&ids(&["intro", "2", "appendix", "1"]), &VoteCounts::new());
        assert_eq!(ranked, ids(&["1", "2", "appendix", "intro"]));
    }

    #[test]
    fn test_counts_beat_id_class() {
        let ranked = rank(&ids(&["1", "intro"]), &counts(&[("intro", 1)]));
        assert_eq!(ranked, ids(&["intro", "1"]));
    }

    #[test]
    fn test_missing_counts_are_zero() {
        let a = ItemId::new("1");
        let b = ItemId::new("2");
        assert_eq!(compare(&a, &b, &counts(&[("2", 0)])), Ordering::Less);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(&[], &VoteCounts::new()).is_empty());
    }
}
