mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use anyhow::Context;
    use echobench::error::FailureKind;
    use echobench::Benchmark;
    use echobench_core::{RunConfig, DEFAULT_PAYLOAD_SIZE};
    use mock_service::{MockConfig, MockServer};
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn single_request_run() -> anyhow::Result<()> {
        init();
        let config = MockConfig::default().delay(Duration::from_millis(150));
        let server = MockServer::spawn(config).await?;

        let outcome = Benchmark::new(&server.addr().to_string())
            .concurrency(workers(1))
            .duration(Duration::from_millis(50))
            .payload_size(4)
            .await;

        let stats = outcome.statistics;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.total_errors, 0);
        assert_eq!(server.frames(), 1);

        let latency = stats.latency.context("a completed request has a latency")?;
        assert_eq!(latency.p50, latency.max);
        assert_eq!(latency.p99, latency.max);
        assert_eq!(latency.min, latency.max);
        assert_eq!(latency.mean, latency.max);
        assert_eq!(latency.histogram.total(), 1);
        assert!(latency.max >= Duration::from_millis(150));
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn hangup_after_handshake() -> anyhow::Result<()> {
        init();
        let server = MockServer::spawn(MockConfig::default().close_after_handshake()).await?;

        let outcome = Benchmark::new(&server.addr().to_string())
            .concurrency(workers(1))
            .duration(Duration::from_millis(500))
            .payload_size(4)
            .await;

        assert_eq!(outcome.statistics.total_requests, 0);
        assert_eq!(outcome.statistics.total_errors, 1);
        assert!(!outcome.statistics.has_data());

        let kind = outcome.workers[0].error.as_ref().map(|e| e.kind());
        assert_ne!(kind, Some(FailureKind::Connect));
        assert!(matches!(
            kind,
            Some(FailureKind::Read) | Some(FailureKind::Write)
        ));
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn missing_handshake_is_tolerated() -> anyhow::Result<()> {
        init();
        let server = MockServer::spawn(MockConfig::default().without_handshake()).await?;

        let config = RunConfig::new(&server.addr().to_string())
            .concurrency(workers(2))
            .duration(Duration::from_millis(600))
            .payload_size(4)
            .handshake_timeout(Duration::from_millis(200));
        let outcome = Benchmark::with_config(config).await;

        assert_eq!(outcome.statistics.total_errors, 0);
        assert!(outcome.statistics.total_requests > 0);
        assert!(outcome.workers.iter().all(|w| w.completed > 0));
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn missing_handshake_strict() -> anyhow::Result<()> {
        init();
        let server = MockServer::spawn(MockConfig::default().without_handshake()).await?;

        let config = RunConfig::new(&server.addr().to_string())
            .concurrency(workers(2))
            .duration(Duration::from_millis(600))
            .handshake_timeout(Duration::from_millis(200))
            .strict_handshake(true);
        let outcome = Benchmark::with_config(config).await;

        assert_eq!(outcome.statistics.total_requests, 0);
        assert_eq!(outcome.statistics.total_errors, 2);
        assert_eq!(server.frames(), 0);
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn partial_reply_is_not_counted() -> anyhow::Result<()> {
        init();
        let server = MockServer::spawn(MockConfig::default().truncate_reply(2)).await?;

        let outcome = Benchmark::new(&server.addr().to_string())
            .concurrency(workers(3))
            .duration(Duration::from_millis(500))
            .payload_size(4)
            .await;

        assert_eq!(outcome.statistics.total_requests, 0);
        assert_eq!(outcome.statistics.total_errors, 3);
        assert!(!outcome.statistics.has_data());
        assert!(outcome
            .workers
            .iter()
            .all(|w| w.error.as_ref().map(|e| e.kind()) == Some(FailureKind::Read)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10000)]
    async fn many_workers_merge_without_loss() -> anyhow::Result<()> {
        init();
        let server = MockServer::spawn(MockConfig::default()).await?;

        let outcome = Benchmark::new(&server.addr().to_string())
            .concurrency(workers(50))
            .duration(Duration::from_millis(500))
            .payload_size(DEFAULT_PAYLOAD_SIZE)
            .await;

        let stats = &outcome.statistics;
        let per_worker: u64 = outcome.workers.iter().map(|w| w.completed as u64).sum();

        assert_eq!(outcome.workers.len(), 50);
        assert_eq!(server.connections(), 50);
        assert_eq!(stats.total_errors, 0);
        assert_eq!(stats.total_requests, per_worker);
        assert_eq!(stats.total_requests, server.frames());
        assert_eq!(
            stats.latency.as_ref().map(|l| l.histogram.total()),
            Some(per_worker)
        );
        assert!(outcome.workers.iter().all(|w| w.completed > 0));
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn unreachable_target() -> anyhow::Result<()> {
        init();
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?
        };

        let outcome = Benchmark::new(&addr.to_string())
            .concurrency(workers(5))
            .duration(Duration::from_millis(100))
            .await;

        assert_eq!(outcome.statistics.total_errors, 5);
        assert!(!outcome.statistics.has_data());
        assert!(outcome
            .workers
            .iter()
            .all(|w| w.error.as_ref().map(|e| e.kind()) == Some(FailureKind::Connect)));
        Ok(())
    }
}
