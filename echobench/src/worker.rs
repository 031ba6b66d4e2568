//! One connection, driven end-to-end.
//!
//! `Connecting -> Handshaking -> Looping -> Draining -> Done`. Any failure jumps straight to
//! `Done` (through `Draining` once the loop has started), bumps the shared error counter, and
//! ends the worker. Whatever samples were collected are merged into the [`Aggregator`] exactly
//! once, on the way out.
use crate::aggregator::Aggregator;
use crate::error::WorkerError;
use echobench_core::{encode, read_response, RequestFrame, RunConfig, HANDSHAKE_BYTE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

const INITIAL_SAMPLE_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Handshaking,
    Looping,
    Draining,
    Done,
}

/// What a single worker contributed to the run.
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    /// Request/response cycles completed, equal to the number of samples merged.
    pub completed: usize,
    /// The failure that ended the worker, if it did not simply reach the deadline.
    pub error: Option<WorkerError>,
}

pub struct ConnectionWorker {
    id: usize,
    config: Arc<RunConfig>,
    deadline: Instant,
    aggregator: Arc<Aggregator>,
    frame: RequestFrame,
    state: WorkerState,
}

impl ConnectionWorker {
    pub fn new(
        id: usize,
        config: Arc<RunConfig>,
        deadline: Instant,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        let frame = encode(config.payload_size, config.filler);
        Self {
            id,
            config,
            deadline,
            aggregator,
            frame,
            state: WorkerState::Connecting,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[instrument(name = "worker", skip_all, fields(id = self.id))]
    pub async fn run(mut self) -> WorkerReport {
        let mut samples = Vec::with_capacity(INITIAL_SAMPLE_CAPACITY);
        let res = self.drive(&mut samples).await;

        if let Err(err) = &res {
            debug!("Worker stopped after {} requests: {err}", samples.len());
            self.aggregator.increment_errors();
            #[cfg(feature = "metrics")]
            metrics::counter!(crate::ERROR_METRIC).increment(1);
        }

        self.transition(WorkerState::Done);
        let completed = samples.len();
        if let Err(err) = self.aggregator.record_batch(samples) {
            error!("Unable to merge {completed} latency samples: {err}");
        }

        WorkerReport {
            id: self.id,
            completed,
            error: res.err(),
        }
    }

    async fn drive(&mut self, samples: &mut Vec<Duration>) -> Result<(), WorkerError> {
        let mut stream = BufReader::new(self.connect().await?);
        self.handshake(&mut stream).await?;

        let res = self.cycle(&mut stream, samples).await;

        self.transition(WorkerState::Draining);
        if let Err(err) = stream.shutdown().await {
            trace!("Shutdown on a closed connection: {err}");
        }

        res
    }

    async fn connect(&mut self) -> Result<TcpStream, WorkerError> {
        self.transition(WorkerState::Connecting);
        let limit = self.config.connect_timeout;
        let stream = timeout(limit, TcpStream::connect(self.config.target.as_str()))
            .await
            .map_err(|_| WorkerError::ConnectTimeout(limit))?
            .map_err(WorkerError::Connect)?;
        stream.set_nodelay(true).map_err(WorkerError::Connect)?;
        Ok(stream)
    }

    async fn handshake(&mut self, stream: &mut BufReader<TcpStream>) -> Result<(), WorkerError> {
        self.transition(WorkerState::Handshaking);
        let limit = self.config.handshake_timeout;
        match timeout(limit, stream.read_u8()).await {
            Ok(Ok(HANDSHAKE_BYTE)) => {}
            // Some servers skip the handshake and treat the first byte as data already.
            Ok(Ok(byte)) => debug!("Unexpected handshake byte {byte:#04x}; continuing."),
            Ok(Err(err)) => return Err(WorkerError::Handshake(err)),
            Err(_) if self.config.strict_handshake => {
                return Err(WorkerError::HandshakeTimeout(limit))
            }
            Err(_) => debug!("No handshake byte within {limit:?}; continuing without it."),
        }
        Ok(())
    }

    /// Request/response cycles until the deadline. The deadline is only checked between cycles,
    /// so a cycle in flight when it passes still completes and is counted.
    async fn cycle(
        &mut self,
        stream: &mut BufReader<TcpStream>,
        samples: &mut Vec<Duration>,
    ) -> Result<(), WorkerError> {
        self.transition(WorkerState::Looping);
        let mut reply = vec![0u8; self.frame.response_len()];

        while Instant::now() < self.deadline {
            let start = Instant::now();

            stream
                .write_all(self.frame.as_bytes())
                .await
                .map_err(WorkerError::Write)?;
            read_response(stream, &mut reply).await?;

            let latency = start.elapsed();
            samples.push(latency);
            self.aggregator.increment_successes();

            #[cfg(feature = "metrics")]
            {
                metrics::histogram!(crate::LATENCY_METRIC).record(latency.as_secs_f64());
                metrics::counter!(crate::SUCCESS_METRIC).increment(1);
            }
        }

        Ok(())
    }

    fn transition(&mut self, state: WorkerState) {
        trace!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use echobench_core::FrameError;
    use mock_service::{MockConfig, MockServer};
    use std::net::SocketAddr;

    fn config(addr: SocketAddr) -> RunConfig {
        RunConfig::new(&addr.to_string())
            .payload_size(4)
            .handshake_timeout(Duration::from_millis(200))
    }

    async fn run_worker(config: RunConfig, run_for: Duration) -> (WorkerReport, Arc<Aggregator>) {
        let aggregator = Arc::new(Aggregator::new());
        let worker = ConnectionWorker::new(
            0,
            Arc::new(config),
            Instant::now() + run_for,
            aggregator.clone(),
        );
        assert_eq!(worker.state(), WorkerState::Connecting);
        (worker.run().await, aggregator)
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn loops_until_deadline() {
        let server = MockServer::spawn(MockConfig::default()).await.unwrap();
        let (report, aggregator) =
            run_worker(config(server.addr()), Duration::from_millis(200)).await;

        assert!(report.error.is_none());
        assert!(report.completed > 0);
        assert_eq!(aggregator.successes(), report.completed as u64);
        assert_eq!(aggregator.errors(), 0);
        assert_eq!(aggregator.take_samples().unwrap().len(), report.completed);
        assert_eq!(server.frames(), report.completed as u64);
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn expired_deadline_sends_nothing() {
        let server = MockServer::spawn(MockConfig::default()).await.unwrap();
        let (report, aggregator) = run_worker(config(server.addr()), Duration::ZERO).await;

        assert!(report.error.is_none());
        assert_eq!(report.completed, 0);
        assert_eq!(aggregator.errors(), 0);
        assert_eq!(server.frames(), 0);
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn connect_refused() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let (report, aggregator) = run_worker(config(addr), Duration::from_millis(200)).await;

        assert_eq!(report.error.map(|e| e.kind()), Some(FailureKind::Connect));
        assert_eq!(report.completed, 0);
        assert_eq!(aggregator.errors(), 1);
        assert!(aggregator.take_samples().unwrap().is_empty());
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn tolerates_missing_handshake() {
        let server = MockServer::spawn(MockConfig::default().without_handshake())
            .await
            .unwrap();
        let (report, aggregator) =
            run_worker(config(server.addr()), Duration::from_millis(400)).await;

        assert!(report.error.is_none());
        assert!(report.completed > 0);
        assert_eq!(aggregator.errors(), 0);
        assert!(logs_contain("No handshake byte"));
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn strict_handshake_times_out() {
        let server = MockServer::spawn(MockConfig::default().without_handshake())
            .await
            .unwrap();
        let config = config(server.addr()).strict_handshake(true);
        let (report, aggregator) = run_worker(config, Duration::from_millis(400)).await;

        assert!(matches!(report.error, Some(WorkerError::HandshakeTimeout(_))));
        assert_eq!(report.completed, 0);
        assert_eq!(aggregator.errors(), 1);
        assert_eq!(server.frames(), 0);
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn handshake_eof() {
        let server = MockServer::spawn(
            MockConfig::default()
                .without_handshake()
                .close_after_handshake(),
        )
        .await
        .unwrap();
        let (report, aggregator) =
            run_worker(config(server.addr()), Duration::from_millis(400)).await;

        assert_eq!(report.error.map(|e| e.kind()), Some(FailureKind::Handshake));
        assert_eq!(report.completed, 0);
        assert_eq!(aggregator.errors(), 1);
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn hangup_after_handshake_is_a_read_failure() {
        let server = MockServer::spawn(MockConfig::default().close_after_handshake())
            .await
            .unwrap();
        let (report, aggregator) = run_worker(config(server.addr()), Duration::from_secs(1)).await;

        assert_eq!(report.completed, 0);
        assert_eq!(aggregator.successes(), 0);
        assert_eq!(aggregator.errors(), 1);
        assert!(matches!(
            report.error.map(|e| e.kind()),
            Some(FailureKind::Read) | Some(FailureKind::Write)
        ));
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn in_flight_cycle_completes_after_deadline() {
        let server = MockServer::spawn(MockConfig::default().delay(Duration::from_millis(300)))
            .await
            .unwrap();
        let started = Instant::now();
        let (report, _) = run_worker(config(server.addr()), Duration::from_millis(100)).await;

        assert!(report.error.is_none());
        assert_eq!(report.completed, 1);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn partial_reply_records_no_sample() {
        let server = MockServer::spawn(MockConfig::default().truncate_reply(2))
            .await
            .unwrap();
        let (report, aggregator) = run_worker(config(server.addr()), Duration::from_secs(1)).await;

        assert_eq!(report.completed, 0);
        assert_eq!(aggregator.successes(), 0);
        assert_eq!(aggregator.errors(), 1);
        assert!(aggregator.take_samples().unwrap().is_empty());

        let error = report.error.unwrap();
        assert_eq!(error.kind(), FailureKind::Read);
        if let WorkerError::Read(FrameError::Short { expected, received }) = error {
            assert_eq!(expected, 4);
            assert!(received < expected);
        }
    }
}
