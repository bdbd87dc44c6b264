//! Page fetching.
//!
//! The analysis tasks only depend on the [`PageFetcher`] capability; the
//! production implementation is [`HttpFetcher`].

pub mod http;
#[cfg(test)]
pub mod stub;

pub use http::HttpFetcher;

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;

/// Browser user agent sent by default. Some sites block unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Elements whose text is never visible.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Errors produced while fetching a page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Capability to retrieve a page within a time limit.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Raw HTML of a fetched page with the structural queries analysis needs.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Visible text of `<body>` with whitespace collapsed to single spaces.
    pub fn body_text(&self) -> String {
        let document = Html::parse_document(&self.html);
        let body = match Selector::parse("body") {
            Ok(selector) => document.select(&selector).next(),
            Err(_) => None,
        };
        let root = body.unwrap_or_else(|| document.root_element());

        let mut text = String::new();
        for node in root.descendants() {
            let Some(fragment) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                .is_some_and(|name| INVISIBLE_TAGS.contains(&name));
            if !hidden {
                text.push_str(fragment);
                text.push(' ');
            }
        }

        collapse_whitespace(&text)
    }

    /// Trimmed text of every `h2` and `h3`, in document order.
    pub fn headings(&self) -> Vec<String> {
        let document = Html::parse_document(&self.html);
        let selector = match Selector::parse("h2, h3") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };

        document
            .select(&selector)
            .map(|heading| collapse_whitespace(&heading.text().collect::<Vec<_>>().join(" ")))
            .collect()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
