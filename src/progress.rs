//! Progress reporting shared by the external collaborators.
//!
//! A long-running operation (fetching model files, transcribing audio
//! segments) reports `done / total` counters through a [`ProgressSink`];
//! the workflows point the sink at the job record being driven.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Units of work finished out of the units known so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(done: u64, total: u64) -> Self {
        Self { done: done.min(total), total }
    }
}

/// Cloneable callback receiving [`Progress`] updates.
#[derive(Clone)]
pub struct ProgressSink(Arc<dyn Fn(Progress) + Send + Sync>);

impl ProgressSink {
    pub fn new(report: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        Self(Arc::new(report))
    }

    /// A sink that drops every update.
    #[cfg(test)]
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, done: u64, total: u64) {
        (self.0)(Progress::new(done, total));
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink")
    }
}
