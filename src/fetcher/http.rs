//! HTTP page fetcher backed by reqwest.

use super::{FetchError, FetchedPage, PageFetcher};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetches pages over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher that identifies itself with `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Http(e)
            }
        };

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response.text().await.map_err(classify)?;
        debug!("Fetched {} ({} bytes)", url, html.len());

        Ok(FetchedPage::new(url, html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::DEFAULT_USER_AGENT;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(DEFAULT_USER_AGENT).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", "topictally-test/1.0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<body><h2>Overview text</h2></body>"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/page", server.uri());
        let page = HttpFetcher::new("topictally-test/1.0")
            .unwrap()
            .fetch(&url, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.url, url);
        assert_eq!(page.headings(), vec!["Overview text"]);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let err = fetcher()
            .fetch(&url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let url = format!("{}/slow", server.uri());
        let err = fetcher()
            .fetch(&url, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_urls() {
        let err = fetcher()
            .fetch("not a url", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        let err = fetcher()
            .fetch("ftp://example.com/file", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(ref s) if s == "ftp"));
    }
}
