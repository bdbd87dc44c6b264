//! Concurrent task execution.

pub mod dispatcher;
pub mod pool;

pub use dispatcher::{default_workers, Dispatcher};
