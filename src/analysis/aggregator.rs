//! Result aggregation and statistics.
//!
//! This module folds analysis results into per-category frequency tables.
//! Aggregation runs on the collecting thread only, after results have been
//! handed back by the dispatcher, so the tables are never shared.

use crate::models::{AnalysisResult, Category};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Marker appended to labels that were cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// Occurrence count per normalized label, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyMap(IndexMap<String, usize>);

impl FrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `label`, inserting it with count 1 if absent.
    pub fn increment(&mut self, label: impl Into<String>) {
        *self.0.entry(label.into()).or_insert(0) += 1;
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.0.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

/// Normalize an extracted item into the label it is counted under.
///
/// Section headings longer than `max_len` characters are cut to `max_len`
/// and suffixed with [`TRUNCATION_MARKER`]; keywords are used as-is.
pub fn normalize_label(category: Category, item: &str, max_len: usize) -> Cow<'_, str> {
    match category {
        Category::FeatureKeywords => Cow::Borrowed(item),
        Category::SectionHeadings => {
            if item.chars().count() > max_len {
                let cut: String = item.chars().take(max_len).collect();
                Cow::Owned(format!("{}{}", cut, TRUNCATION_MARKER))
            } else {
                Cow::Borrowed(item)
            }
        }
    }
}

/// Count every item of every result under its normalized label.
pub fn aggregate(category: Category, results: &[AnalysisResult], max_label_len: usize) -> FrequencyMap {
    let mut map = FrequencyMap::new();

    for result in results {
        for item in &result.items {
            map.increment(normalize_label(category, item, max_label_len));
        }
    }

    map
}

/// Number of results that failed to fetch or parse.
pub fn count_failures(results: &[AnalysisResult]) -> usize {
    results.iter().filter(|r| r.is_failed()).count()
}
