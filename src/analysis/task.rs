//! Per-page analysis task.
//!
//! A task fetches one page and extracts the signals its category asks for.
//! Every failure is absorbed here: the caller always gets a result for the
//! URL it submitted, possibly with no items.

use crate::fetcher::{FetchedPage, PageFetcher};
use crate::models::{AnalysisResult, AnalysisTask, Category};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Settings shared by every task of a run.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Keyword vocabulary for [`Category::FeatureKeywords`], in report order.
    pub keywords: Vec<String>,
    /// Headings this short or shorter are treated as navigation chrome.
    pub min_heading_len: usize,
    /// Time limit for a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            keywords: crate::config::default_keywords(),
            min_heading_len: 5,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::Config> for TaskConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            keywords: config.analysis.keywords.clone(),
            min_heading_len: config.analysis.min_heading_len,
            fetch_timeout: Duration::from_secs(config.fetch.timeout_seconds),
        }
    }
}

/// Runs analysis tasks against a page fetcher.
pub struct Analyzer {
    fetcher: Arc<dyn PageFetcher>,
    config: TaskConfig,
}

impl Analyzer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: TaskConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch the task's page and extract its items. Never fails.
    pub async fn analyze(&self, task: &AnalysisTask) -> AnalysisResult {
        debug!("Fetching {} ({})", task.url, task.category);

        match self.fetcher.fetch(&task.url, self.config.fetch_timeout).await {
            Ok(page) => {
                let items = self.extract(&page, task.category);
                debug!("Extracted {} items from {}", items.len(), page.url);
                AnalysisResult::new(task.url.clone(), items)
            }
            Err(e) => {
                warn!("Error processing {}: {}", task.url, e);
                AnalysisResult::failed(task.url.clone(), e.to_string())
            }
        }
    }

    /// Apply the extraction rule for `category` to a fetched page.
    pub fn extract(&self, page: &FetchedPage, category: Category) -> Vec<String> {
        match category {
            Category::FeatureKeywords => {
                extract_keywords(&page.body_text().to_lowercase(), &self.config.keywords)
            }
            Category::SectionHeadings => {
                extract_headings(page.headings(), self.config.min_heading_len)
            }
        }
    }
}

/// Keywords present anywhere in `text`, in vocabulary order, at most once each.
///
/// `text` must already be lower-cased.
pub fn extract_keywords(text: &str, vocabulary: &[String]) -> Vec<String> {
    vocabulary
        .iter()
        .filter(|keyword| text.contains(keyword.to_lowercase().as_str()))
        .cloned()
        .collect()
}

/// Headings longer than `min_len` characters, trimmed, in document order.
pub fn extract_headings(headings: Vec<String>, min_len: usize) -> Vec<String> {
    headings
        .into_iter()
        .map(|heading| heading.trim().to_string())
        .filter(|heading| heading.chars().count() > min_len)
        .collect()
}
