//! Markdown and JSON report generation.
//!
//! This module renders the per-batch frequency tables as a Markdown
//! document with text bar charts, or as JSON.

use crate::models::{CategoryReport, RankedEntry, Report, ReportMetadata};
use anyhow::Result;

/// Width of the longest bar in a chart, in characters.
const MAX_BAR_WIDTH: usize = 30;

const BAR_CHAR: char = '█';

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# TopicTally Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(&report.categories));

    for category in &report.categories {
        output.push_str(&generate_category_section(category));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Workers:** {}\n", metadata.workers));
    section.push_str(&format!(
        "- **Pages Analyzed:** {}/{}\n",
        metadata.pages_total.saturating_sub(metadata.pages_failed),
        metadata.pages_total
    ));
    if metadata.pages_failed > 0 {
        section.push_str(&format!("- **Pages Failed:** {}\n", metadata.pages_failed));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(categories: &[CategoryReport]) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    for category in categories {
        toc.push_str(&format!("- [{}](#{})\n", category.title, anchor(&category.title)));
    }
    toc.push('\n');

    toc
}

/// Generate the section for one batch.
fn generate_category_section(category: &CategoryReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", category.title));
    section.push_str(&format!(
        "*Rule: {} | Pages: {} | Failed: {} | Distinct labels: {}*\n\n",
        category.category,
        category.pages,
        category.pages_failed,
        category.frequencies.len()
    ));

    if category.ranked.is_empty() {
        section.push_str("No signals extracted.\n\n");
        return section;
    }

    section.push_str(&generate_bar_chart(&category.ranked));

    if let Some(n) = category.top_n {
        if category.frequencies.len() > category.ranked.len() {
            section.push_str(&format!(
                "*Showing top {} of {} labels.*\n\n",
                n,
                category.frequencies.len()
            ));
        }
    }

    section
}

/// Render ranked entries as a Markdown table with proportional bars.
fn generate_bar_chart(entries: &[RankedEntry]) -> String {
    let mut chart = String::new();
    let max = entries.iter().map(|e| e.count).max().unwrap_or(0);

    chart.push_str("| Label | Count | Chart |\n");
    chart.push_str("|:---|:---:|:---|\n");

    for entry in entries {
        chart.push_str(&format!(
            "| {} | {} | {} |\n",
            entry.label.replace('|', "\\|"),
            entry.count,
            bar(entry.count, max)
        ));
    }
    chart.push('\n');

    chart
}

/// A bar scaled so that `max` fills [`MAX_BAR_WIDTH`]. Non-zero counts get
/// at least one block.
fn bar(count: usize, max: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let width = (count * MAX_BAR_WIDTH + max - 1) / max;
    BAR_CHAR.to_string().repeat(width.min(MAX_BAR_WIDTH))
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by TopicTally*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
