//! Top-N ranking of frequency tables.

use super::aggregator::FrequencyMap;
use crate::models::RankedEntry;

/// Default number of entries in a ranked view.
pub const DEFAULT_TOP_N: usize = 10;

/// The `n` most frequent labels, highest count first.
///
/// Equal counts keep the order in which their labels were first inserted
/// into `map`. `n == 0` yields an empty list.
pub fn top_n(map: &FrequencyMap, n: usize) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = map
        .iter()
        .map(|(label, count)| RankedEntry::new(label, count))
        .collect();

    // sort_by_key is stable, which gives the insertion-order tie-break
    entries.sort_by_key(|entry| std::cmp::Reverse(entry.count));
    entries.truncate(n);

    entries
}

/// Every label of `map`, ranked.
pub fn rank_all(map: &FrequencyMap) -> Vec<RankedEntry> {
    top_n(map, map.len())
}
