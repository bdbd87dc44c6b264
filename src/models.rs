//! Data models for the page analyzer.
//!
//! This module contains the core data structures passed between the
//! dispatcher, the analysis tasks, the aggregator and the report generator.

use crate::analysis::FrequencyMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extraction rule applied to a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Presence test of a fixed keyword vocabulary against the body text.
    FeatureKeywords,
    /// Level-2 and level-3 section headings, in document order.
    SectionHeadings,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::FeatureKeywords => write!(f, "Feature keywords"),
            Category::SectionHeadings => write!(f, "Section headings"),
        }
    }
}

/// One unit of work: a page to fetch and the rule to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTask {
    pub url: String,
    pub category: Category,
}

impl AnalysisTask {
    pub fn new(url: impl Into<String>, category: Category) -> Self {
        Self {
            url: url.into(),
            category,
        }
    }
}

/// Outcome of a single analysis task.
///
/// `items` is empty both when the page had no matches and when the fetch
/// failed; `error` only carries the diagnostic for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// URL the task was created for.
    pub url: String,
    /// Extracted signals, in extraction order.
    pub items: Vec<String>,
    /// Why the page produced nothing, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// A successful result.
    pub fn new(url: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            url: url.into(),
            items,
            error: None,
        }
    }

    /// A failed result: no items, diagnostic preserved.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            items: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A single row of a ranked view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub count: usize,
}

impl RankedEntry {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Aggregated output for one batch of pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    /// Human-readable title of the batch.
    pub title: String,
    /// Extraction rule used for every page of the batch.
    pub category: Category,
    /// Number of pages submitted.
    pub pages: usize,
    /// Number of pages whose fetch or extraction failed.
    pub pages_failed: usize,
    /// Full frequency table, in first-insertion order.
    pub frequencies: FrequencyMap,
    /// Ranked view presented to readers.
    pub ranked: Vec<RankedEntry>,
    /// Top-N limit applied to `ranked`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time of the run.
    pub analysis_date: DateTime<Utc>,
    /// Size of the worker pool.
    pub workers: usize,
    /// Total pages submitted.
    pub pages_total: usize,
    /// Pages that produced no result because of a failure.
    pub pages_failed: usize,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub categories: Vec<CategoryReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&Category::FeatureKeywords).unwrap();
        assert_eq!(json, "\"feature_keywords\"");

        let parsed: Category = serde_json::from_str("\"section_headings\"").unwrap();
        assert_eq!(parsed, Category::SectionHeadings);
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = AnalysisResult::failed("https://example.com", "HTTP status 404");
        assert!(result.items.is_empty());
        assert!(result.is_failed());
        assert_eq!(result.url, "https://example.com");

        let ok = AnalysisResult::new("https://example.com", vec![]);
        assert!(!ok.is_failed());
    }
}
