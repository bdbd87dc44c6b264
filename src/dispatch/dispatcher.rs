//! Batch dispatch.
//!
//! Submits one analysis task per URL to a fresh worker pool and collects the
//! results in submission order. Collecting result `i` waits for task `i` even
//! when later tasks have already finished.

use super::pool::{Polled, PoolError, TaskHandle, WorkerPool};
use crate::analysis::Analyzer;
use crate::models::{AnalysisResult, AnalysisTask};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const TASK_LOST: &str = "analysis task did not complete";
const DEADLINE_EXCEEDED: &str = "batch deadline exceeded";

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs batches of analysis tasks on a bounded pool.
pub struct Dispatcher {
    analyzer: Arc<Analyzer>,
    workers: usize,
    deadline: Option<Duration>,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(analyzer: Arc<Analyzer>, workers: usize) -> Self {
        Self {
            analyzer,
            workers: workers.max(1),
            deadline: None,
            show_progress: false,
        }
    }

    /// Stop waiting for results once `deadline` has passed since dispatch.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run a single batch. One result per task, in task order.
    pub async fn run_batch(&self, tasks: Vec<AnalysisTask>) -> Result<Vec<AnalysisResult>, PoolError> {
        let mut results = self.run_batches(vec![tasks]).await?;
        Ok(results.pop().unwrap_or_default())
    }

    /// Run several batches through one pool.
    ///
    /// All tasks are submitted up front, batch by batch. The returned vector
    /// has one entry per batch, each holding one result per task in
    /// submission order.
    pub async fn run_batches(
        &self,
        batches: Vec<Vec<AnalysisTask>>,
    ) -> Result<Vec<Vec<AnalysisResult>>, PoolError> {
        let total: usize = batches.iter().map(Vec::len).sum();
        info!(
            "Starting worker pool with {} workers for {} pages",
            self.workers, total
        );

        let started = Instant::now();
        let mut pool = WorkerPool::new(self.workers);
        debug!("Pool ready with {} workers", pool.size());

        let mut submitted: Vec<Vec<(AnalysisTask, TaskHandle<AnalysisResult>)>> =
            Vec::with_capacity(batches.len());
        for batch in batches {
            let mut handles = Vec::with_capacity(batch.len());
            for task in batch {
                let analyzer = Arc::clone(&self.analyzer);
                let job_task = task.clone();
                let handle = pool.submit(async move { analyzer.analyze(&job_task).await })?;
                handles.push((task, handle));
            }
            submitted.push(handles);
        }
        pool.close();

        let progress = self.progress_bar(total as u64);
        let deadline = self.deadline.map(|d| started + d);
        let mut expired = false;

        let mut collected = Vec::with_capacity(submitted.len());
        for handles in submitted {
            let mut results = Vec::with_capacity(handles.len());
            for (task, handle) in handles {
                let result = match deadline {
                    None => collapse(&task, handle.join().await, TASK_LOST),
                    Some(at) if !expired => {
                        match tokio::time::timeout_at(at, handle.join()).await {
                            Ok(output) => collapse(&task, output, TASK_LOST),
                            Err(_) => {
                                expired = true;
                                warn!("Batch deadline passed while waiting for {}", task.url);
                                AnalysisResult::failed(task.url, DEADLINE_EXCEEDED)
                            }
                        }
                    }
                    // Past the deadline: keep whatever already finished.
                    Some(_) => match handle.try_join() {
                        Polled::Done(result) => result,
                        Polled::Pending => collapse(&task, None, DEADLINE_EXCEEDED),
                        Polled::Lost => collapse(&task, None, TASK_LOST),
                    },
                };
                progress.inc(1);
                results.push(result);
            }
            collected.push(results);
        }
        progress.finish_and_clear();

        if expired {
            pool.abort();
        } else {
            pool.shutdown().await?;
        }

        debug!("Collected {} results in {:?}", total, started.elapsed());
        Ok(collected)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// A missing output becomes an empty result for the task's URL.
fn collapse(task: &AnalysisTask, output: Option<AnalysisResult>, reason: &str) -> AnalysisResult {
    output.unwrap_or_else(|| {
        warn!("No result for {}: {}", task.url, reason);
        AnalysisResult::failed(task.url.clone(), reason)
    })
}
