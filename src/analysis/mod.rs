//! Analysis modules.
//!
//! Per-page extraction, frequency aggregation and ranking.

pub mod aggregator;
pub mod ranker;
pub mod task;

pub use aggregator::*;
pub use ranker::*;
pub use task::{Analyzer, TaskConfig};
