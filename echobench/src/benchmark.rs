//! Benchmark coordinator
use crate::aggregator::Aggregator;
use crate::worker::{ConnectionWorker, WorkerReport};
use echobench_core::{RunConfig, RunStatistics};
use std::{
    future::Future,
    num::NonZeroUsize,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

type RunnerFuture = Pin<Box<dyn Future<Output = RunOutcome> + Send>>;

/// Result of a finished run.
#[derive(Debug)]
pub struct RunOutcome {
    pub statistics: RunStatistics,
    /// One entry per worker, in spawn order.
    pub workers: Vec<WorkerReport>,
}

/// Load generator against a single endpoint.
///
/// Configure with the builder methods, then `.await` it to run.
///
/// # Example
/// ```no_run
/// use echobench::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let outcome = Benchmark::new("localhost:9090")
///         .duration(Duration::from_secs(10))
///         .payload_size(64)
///         .await;
///
///     println!("{:.2} req/sec", outcome.statistics.qps);
/// }
/// ```
pub struct Benchmark {
    config: RunConfig,
    runner_fut: Option<RunnerFuture>,
}

impl Benchmark {
    pub fn new(target: &str) -> Self {
        Self::with_config(RunConfig::new(target))
    }

    pub fn with_config(config: RunConfig) -> Self {
        Self {
            config,
            runner_fut: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Number of parallel connections.
    pub fn concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.config = self.config.concurrency(concurrency);
        self
    }

    /// How long each connection keeps sending requests.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config = self.config.duration(duration);
        self
    }

    /// Payload bytes per request, excluding the two delimiters.
    pub fn payload_size(mut self, payload_size: usize) -> Self {
        self.config = self.config.payload_size(payload_size);
        self
    }

    /// Fail connections whose server never sends the handshake byte.
    pub fn strict_handshake(mut self) -> Self {
        self.config = self.config.strict_handshake(true);
        self
    }
}

impl Future for Benchmark {
    type Output = RunOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let config = &this.config;
        let runner = this
            .runner_fut
            .get_or_insert_with(|| -> RunnerFuture { Box::pin(run_benchmark(config.clone())) });
        runner.as_mut().poll(cx)
    }
}

/// Spawn one worker per unit of concurrency, wait for all of them, then compute statistics.
///
/// Every worker shares the same end instant. Statistics are only computed after the last
/// worker has been joined, so all sample merges are visible by then.
#[instrument(name = "benchmark", skip_all, fields(target = %config.target))]
pub async fn run_benchmark(config: RunConfig) -> RunOutcome {
    info!("Running benchmark with {config}");

    let config = Arc::new(config);
    let aggregator = Arc::new(Aggregator::new());

    let start = Instant::now();
    let deadline = start + config.duration;

    let handles: Vec<_> = (0..config.concurrency.get())
        .map(|id| {
            let worker = ConnectionWorker::new(id, config.clone(), deadline, aggregator.clone());
            tokio::spawn(worker.run())
        })
        .collect();

    let mut workers = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => workers.push(report),
            Err(err) => {
                error!("Worker task failed: {err}");
                aggregator.increment_errors();
            }
        }
    }

    let elapsed = start.elapsed();
    let samples = aggregator.take_samples().unwrap_or_else(|err| {
        error!("Latency samples unavailable: {err}");
        vec![]
    });

    if samples.len() as u64 != aggregator.successes() {
        warn!(
            "Merged {} samples but counted {} successes.",
            samples.len(),
            aggregator.successes()
        );
    }

    let statistics = RunStatistics::compute(&samples, aggregator.errors(), elapsed);
    info!(
        "Benchmark complete: {} requests, {} errors in {:.2}s",
        statistics.total_requests,
        statistics.total_errors,
        elapsed.as_secs_f64()
    );

    RunOutcome {
        statistics,
        workers,
    }
}
