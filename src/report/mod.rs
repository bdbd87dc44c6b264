//! Report assembly and rendering.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::analysis::{aggregate, count_failures, rank_all, top_n};
use crate::config::BatchConfig;
use crate::models::{AnalysisResult, CategoryReport};

/// Aggregate and rank the results of one batch.
pub fn build_category_report(
    batch: &BatchConfig,
    results: &[AnalysisResult],
    max_label_len: usize,
) -> CategoryReport {
    let frequencies = aggregate(batch.category, results, max_label_len);
    let ranked = match batch.top_n {
        Some(n) => top_n(&frequencies, n),
        None => rank_all(&frequencies),
    };

    CategoryReport {
        title: batch.title.clone(),
        category: batch.category,
        pages: results.len(),
        pages_failed: count_failures(results),
        frequencies,
        ranked,
        top_n: batch.top_n,
    }
}
