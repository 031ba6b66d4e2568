use crate::error::AggregatorError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Shared result sink for every worker of a run.
///
/// Counters are plain atomics. Samples are appended under a lock which is held only for the
/// append itself, never across I/O. Readers must wait until every worker has been joined.
#[derive(Debug, Default)]
pub struct Aggregator {
    successes: AtomicU64,
    errors: AtomicU64,
    samples: Mutex<Vec<Duration>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_successes(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Merge one worker's samples. Called exactly once per worker.
    pub fn record_batch(&self, mut samples: Vec<Duration>) -> Result<(), AggregatorError> {
        self.samples.lock()?.append(&mut samples);
        Ok(())
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Take the merged samples, leaving the aggregator empty.
    pub fn take_samples(&self) -> Result<Vec<Duration>, AggregatorError> {
        Ok(std::mem::take(&mut *self.samples.lock()?))
    }
}
