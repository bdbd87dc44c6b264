//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.topictally.toml` files.

use crate::analysis::DEFAULT_TOP_N;
use crate::models::{AnalysisTask, Category};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".topictally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Extraction and labelling settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Page batches to analyze, in report order.
    #[serde(default = "default_batches")]
    pub batches: Vec<BatchConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            fetch: FetchConfig::default(),
            analysis: AnalysisConfig::default(),
            batches: default_batches(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Worker pool size. Defaults to the number of available CPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Stop waiting for unfinished pages after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            workers: None,
            deadline_seconds: None,
        }
    }
}

fn default_output() -> String {
    "topictally_report.md".to_string()
}

/// HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-page timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    crate::fetcher::DEFAULT_USER_AGENT.to_string()
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Vocabulary searched for in `feature_keywords` pages.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Headings of this many characters or fewer are dropped.
    #[serde(default = "default_min_heading_len")]
    pub min_heading_len: usize,

    /// Heading labels longer than this are truncated before counting.
    #[serde(default = "default_max_label_len")]
    pub max_label_len: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            min_heading_len: default_min_heading_len(),
            max_label_len: default_max_label_len(),
        }
    }
}

pub(crate) fn default_keywords() -> Vec<String> {
    vec![
        "location", "time", "suspect", "victim", "weapon", "witness", "evidence", "arrest",
        "outcome", "police",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_min_heading_len() -> usize {
    5
}

fn default_max_label_len() -> usize {
    15
}

/// A titled group of pages sharing one extraction rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Report heading for this batch.
    pub title: String,

    /// Extraction rule for every page in the batch.
    pub category: Category,

    /// Limit the report to the N most frequent labels. All labels if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,

    /// Pages to analyze, in submission order.
    pub urls: Vec<String>,
}

impl BatchConfig {
    /// One analysis task per URL, in order.
    pub fn tasks(&self) -> Vec<AnalysisTask> {
        self.urls
            .iter()
            .map(|url| AnalysisTask::new(url.clone(), self.category))
            .collect()
    }
}

fn default_batches() -> Vec<BatchConfig> {
    let wiki = |page: &str| format!("https://en.wikipedia.org/wiki/{}", page);

    vec![
        BatchConfig {
            title: "Distinctive Features in Crime Papers".to_string(),
            category: Category::FeatureKeywords,
            top_n: None,
            urls: [
                "Crime_statistics",
                "Police_procedural",
                "First_Information_Report",
                "Forensic_science",
                "Criminal_investigation",
                "Uniform_Crime_Reports",
                "CompStat",
                "Criminal_justice",
                "Criminology",
                "Offender_profiling",
            ]
            .iter()
            .map(|page| wiki(page))
            .collect(),
        },
        BatchConfig {
            title: "Top 10 Sub-headings in Deep Learning Papers".to_string(),
            category: Category::SectionHeadings,
            top_n: Some(DEFAULT_TOP_N),
            urls: [
                "Deep_learning",
                "Convolutional_neural_network",
                "Recurrent_neural_network",
                "Transformer_(machine_learning)",
            ]
            .iter()
            .map(|page| wiki(page))
            .collect(),
        },
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(workers) = args.workers {
            self.general.workers = Some(workers);
        }
        if let Some(timeout) = args.timeout {
            self.fetch.timeout_seconds = timeout;
        }
        if let Some(deadline) = args.deadline {
            self.general.deadline_seconds = Some(deadline);
        }
        if let Some(top_n) = args.top_n {
            for batch in &mut self.batches {
                batch.top_n = Some(top_n);
            }
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check settings that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.general.workers == Some(0) {
            bail!("Worker count must be at least 1");
        }
        if self.fetch.timeout_seconds == 0 {
            bail!("Fetch timeout must be at least 1 second");
        }
        if self.general.deadline_seconds == Some(0) {
            bail!("Batch deadline must be at least 1 second");
        }

        for batch in &self.batches {
            for url in &batch.urls {
                let parsed = Url::parse(url).with_context(|| {
                    format!("Invalid URL in batch '{}': {}", batch.title, url)
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    bail!(
                        "URL in batch '{}' must use http or https: {}",
                        batch.title,
                        url
                    );
                }
            }
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.timeout_seconds, 30);
        assert_eq!(config.analysis.keywords.len(), 10);
        assert_eq!(config.analysis.keywords[0], "location");
        assert_eq!(config.batches.len(), 2);
        assert_eq!(config.batches[0].urls.len(), 10);
        assert_eq!(config.batches[1].category, Category::SectionHeadings);
        assert_eq!(config.batches[1].top_n, Some(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
workers = 3

[analysis]
keywords = ["alpha", "beta"]

[[batches]]
title = "Greek"
category = "feature_keywords"
urls = ["https://example.com/a", "https://example.com/b"]

[[batches]]
title = "Headings"
category = "section_headings"
top_n = 5
urls = ["https://example.com/c"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.general.workers, Some(3));
        assert_eq!(config.fetch.timeout_seconds, 30);
        assert_eq!(config.analysis.keywords, vec!["alpha", "beta"]);
        assert_eq!(config.analysis.max_label_len, 15);
        assert_eq!(config.batches.len(), 2);
        assert_eq!(config.batches[1].top_n, Some(5));

        let tasks = config.batches[0].tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].url, "https://example.com/b");
        assert_eq!(tasks[1].category, Category::FeatureKeywords);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let toml_content = r#"
[[batches]]
title = "Bad"
category = "sentiment"
urls = []
"#;
        assert!(toml::from_str::<Config>(toml_content).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = Config::default();
        config.batches[0].urls.push("not a url".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batches[0].urls.push("file:///etc/passwd".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.workers = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\ntimeout_seconds = 5").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.fetch.timeout_seconds, 5);
        assert_eq!(config.batches.len(), 2);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[fetch]"));
        assert!(toml_str.contains("[[batches]]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.batches.len(), 2);
    }
}
