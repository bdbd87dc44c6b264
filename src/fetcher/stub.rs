//! In-memory fetcher used by tests.

use super::{FetchError, FetchedPage, PageFetcher};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    Serve(String),
    Fail(u16),
    Panic,
}

#[derive(Debug, Clone)]
struct StubPage {
    behavior: Behavior,
    delay: Duration,
}

/// Serves canned pages with optional delays, failures and panics, and
/// records the order in which fetches completed and how many overlapped.
#[derive(Debug, Clone, Default)]
pub struct StubFetcher {
    pages: HashMap<String, StubPage>,
    completed: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Counts one fetch as in flight until dropped, panics included.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.insert(url, Behavior::Serve(html.to_string()), Duration::ZERO)
    }

    pub fn slow_page(self, url: &str, html: &str, delay: Duration) -> Self {
        self.insert(url, Behavior::Serve(html.to_string()), delay)
    }

    pub fn failing(self, url: &str, status: u16) -> Self {
        self.insert(url, Behavior::Fail(status), Duration::ZERO)
    }

    pub fn panicking(self, url: &str) -> Self {
        self.insert(url, Behavior::Panic, Duration::ZERO)
    }

    /// URLs in the order their fetch finished.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    /// Largest number of fetches that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn insert(mut self, url: &str, behavior: Behavior, delay: Duration) -> Self {
        self.pages
            .insert(url.to_string(), StubPage { behavior, delay });
        self
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let Some(page) = self.pages.get(url).cloned() else {
            return Err(FetchError::Status(404));
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _running = InFlight(&self.in_flight);

        if page.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(FetchError::Timeout(timeout));
        }
        if !page.delay.is_zero() {
            tokio::time::sleep(page.delay).await;
        }

        self.completed.lock().unwrap().push(url.to_string());

        match page.behavior {
            Behavior::Serve(html) => Ok(FetchedPage::new(url, html)),
            Behavior::Fail(status) => Err(FetchError::Status(status)),
            Behavior::Panic => panic!("stub fetcher asked to panic for {url}"),
        }
    }
}
