//! Fixed-size worker pool.
//!
//! `size` long-lived workers drain one shared queue. Each submission gets a
//! [`TaskHandle`] that resolves once its job has run. A job that panics is
//! contained by the worker running it; its handle resolves to `None` and the
//! worker moves on to the next job.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Job<R> = (BoxFuture<'static, R>, oneshot::Sender<R>);
type Queue<R> = Arc<Mutex<mpsc::UnboundedReceiver<Job<R>>>>;

/// Failures of the pool itself. These abort the whole run.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker pool is closed to new submissions")]
    Closed,

    #[error("Worker failed to shut down cleanly: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to the eventual output of one submitted job.
#[derive(Debug)]
pub struct TaskHandle<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// Wait for the job. `None` if it panicked or was aborted.
    pub async fn join(self) -> Option<R> {
        self.rx.await.ok()
    }

    /// Check on the job without waiting.
    pub fn try_join(mut self) -> Polled<R> {
        match self.rx.try_recv() {
            Ok(output) => Polled::Done(output),
            Err(oneshot::error::TryRecvError::Empty) => Polled::Pending,
            Err(oneshot::error::TryRecvError::Closed) => Polled::Lost,
        }
    }
}

/// State of a job observed through [`TaskHandle::try_join`].
#[derive(Debug, PartialEq, Eq)]
pub enum Polled<R> {
    /// The job finished with this output.
    Done(R),
    /// The job is queued or still running.
    Pending,
    /// The job panicked or its worker was aborted.
    Lost,
}

/// Pool of `size` workers sharing a job queue.
pub struct WorkerPool<R> {
    sender: Option<mpsc::UnboundedSender<Job<R>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Start a pool. A size of zero is raised to one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Job<R>>();
        let queue: Queue<R> = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&queue))))
            .collect();

        debug!("Started worker pool with {} workers", size);

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job for execution.
    pub fn submit<F>(&self, job: F) -> Result<TaskHandle<R>, PoolError>
    where
        F: Future<Output = R> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        let (tx, rx) = oneshot::channel();

        sender
            .send((job.boxed(), tx))
            .map_err(|_| PoolError::Closed)?;

        Ok(TaskHandle { rx })
    }

    /// Stop accepting submissions. Queued jobs still run.
    pub fn close(&mut self) {
        self.sender.take();
    }

    /// Close the pool and wait for every worker to drain the queue and exit.
    pub async fn shutdown(mut self) -> Result<(), PoolError> {
        self.close();

        for worker in self.workers.drain(..) {
            worker.await?;
        }

        debug!("Worker pool shut down");
        Ok(())
    }

    /// Close the pool and cancel every worker, including in-flight jobs.
    pub fn abort(mut self) {
        self.close();

        for worker in self.workers.drain(..) {
            worker.abort();
        }

        warn!("Worker pool aborted with jobs still running");
    }
}

async fn worker_loop<R: Send + 'static>(id: usize, queue: Queue<R>) {
    loop {
        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };

        let Some((job, reply)) = next else {
            break;
        };

        match AssertUnwindSafe(job).catch_unwind().await {
            Ok(output) => {
                // The caller may have stopped waiting; that is not an error here.
                let _ = reply.send(output);
            }
            Err(panic) => {
                warn!(
                    "Worker {} recovered from a panicking job: {}",
                    id,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    debug!("Worker {} exiting", id);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_size_is_raised_to_one() {
        let pool: WorkerPool<u32> = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collection_is_head_of_line() {
        let pool = WorkerPool::new(2);
        let log = Arc::new(StdMutex::new(Vec::new()));

        let slow_log = Arc::clone(&log);
        let slow = pool
            .submit(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                slow_log.lock().unwrap().push("slow finished");
                1
            })
            .unwrap();

        let fast_log = Arc::clone(&log);
        let fast = pool
            .submit(async move {
                fast_log.lock().unwrap().push("fast finished");
                2
            })
            .unwrap();

        // Collect in submission order.
        assert_eq!(slow.join().await, Some(1));
        log.lock().unwrap().push("slow collected");
        assert_eq!(fast.join().await, Some(2));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["fast finished", "slow finished", "slow collected"]
        );

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1);

        let bad = pool
            .submit(async {
                if true {
                    panic!("boom");
                }
                0
            })
            .unwrap();
        let good = pool.submit(async { 7 }).unwrap();

        assert_eq!(bad.join().await, None);
        assert_eq!(good.join().await, Some(7));

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let mut pool: WorkerPool<u32> = WorkerPool::new(2);
        pool.close();

        let err = pool.submit(async { 1 }).unwrap_err();
        assert!(matches!(err, PoolError::Closed));

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_runs_queued_jobs() {
        let pool = WorkerPool::new(1);
        let handles: Vec<_> = (0..5)
            .map(|i| pool.submit(async move { i * 10 }).unwrap())
            .collect();

        pool.shutdown().await.unwrap();

        let mut outputs = Vec::new();
        for handle in handles {
            outputs.push(handle.try_join());
        }
        assert_eq!(
            outputs,
            vec![
                Polled::Done(0),
                Polled::Done(10),
                Polled::Done(20),
                Polled::Done(30),
                Polled::Done(40)
            ]
        );
    }

    #[tokio::test]
    async fn test_try_join_tells_pending_from_lost() {
        let pool = WorkerPool::new(2);

        let crashed = pool
            .submit(async {
                if true {
                    panic!("boom");
                }
                0
            })
            .unwrap();
        let stuck = pool
            .submit(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                1
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(crashed.try_join(), Polled::Lost);
        assert_eq!(stuck.try_join(), Polled::Pending);

        pool.abort();
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
