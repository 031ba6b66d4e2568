use echobench_core::{FrameTransformer, HANDSHAKE_BYTE};
use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn, Instrument};

const READ_BUFFER_SIZE: usize = 1024;
const ACCEPT_RETRY_BASE: Duration = Duration::from_millis(10);
const ACCEPT_RETRY_MAX: Duration = Duration::from_secs(1);

/// How the mock server behaves on each connection.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Send the handshake byte on accept.
    pub handshake: bool,
    /// Hang up right after the handshake, without answering anything.
    pub close_after_handshake: bool,
    /// Wait this long before writing each reply.
    pub delay: Option<Duration>,
    /// Send at most this many bytes of the first reply, then hang up.
    pub truncate_reply: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            handshake: true,
            close_after_handshake: false,
            delay: None,
            truncate_reply: None,
        }
    }
}

impl MockConfig {
    pub fn without_handshake(mut self) -> Self {
        self.handshake = false;
        self
    }

    pub fn close_after_handshake(mut self) -> Self {
        self.close_after_handshake = true;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn truncate_reply(mut self, len: usize) -> Self {
        self.truncate_reply = Some(len);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicU64,
    frames: AtomicU64,
}

/// A running mock server. The accept loop is aborted on drop.
pub struct MockServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Bind an ephemeral port on localhost and start serving.
    pub async fn spawn(config: MockConfig) -> io::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0)), config).await
    }

    pub async fn bind(addr: SocketAddr, config: MockConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let counters = Arc::new(Counters::default());
        let handle = tokio::spawn(accept_loop(listener, config, counters.clone()));
        Ok(Self {
            addr,
            counters,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> u64 {
        self.counters.connections.load(Ordering::SeqCst)
    }

    /// Request frames fully received so far. Counted before the reply is written.
    pub fn frames(&self) -> u64 {
        self.counters.frames.load(Ordering::SeqCst)
    }

    /// Serve until the accept loop ends.
    pub async fn wait(mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn accept_loop(listener: TcpListener, config: MockConfig, counters: Arc<Counters>) {
    let mut failures = 0u32;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                failures = 0;
                counters.connections.fetch_add(1, Ordering::SeqCst);
                debug!("Peer {peer} connected");
                let config = config.clone();
                let counters = counters.clone();
                tokio::spawn(
                    async move {
                        if let Err(err) = serve_connection(stream, &config, &counters).await {
                            debug!("Connection ended with error: {err}");
                        }
                        debug!("Peer disconnected");
                    }
                    .instrument(tracing::debug_span!("connection", %peer)),
                );
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                let delay = accept_retry_delay(failures);
                warn!("Accept failed ({failures} in a row), retrying in {delay:?}: {err}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Pause before the next accept after `failures` consecutive errors. Doubles from
/// `ACCEPT_RETRY_BASE` up to `ACCEPT_RETRY_MAX`.
fn accept_retry_delay(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(16);
    ACCEPT_RETRY_BASE
        .saturating_mul(1 << exp)
        .min(ACCEPT_RETRY_MAX)
}

async fn serve_connection(
    mut stream: TcpStream,
    config: &MockConfig,
    counters: &Counters,
) -> io::Result<()> {
    stream.set_nodelay(true)?;

    if config.handshake {
        stream.write_all(&[HANDSHAKE_BYTE]).await?;
    }
    if config.close_after_handshake {
        trace!("Closing after handshake");
        return Ok(());
    }

    let mut transformer = FrameTransformer::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut out = Vec::with_capacity(READ_BUFFER_SIZE);
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        out.clear();
        let closed = transformer.feed(&buf[..n], &mut out);
        counters.frames.fetch_add(closed as u64, Ordering::SeqCst);

        if out.is_empty() {
            continue;
        }
        if let Some(delay) = config.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(len) = config.truncate_reply {
            out.truncate(len);
            stream.write_all(&out).await?;
            trace!("Hanging up after a {}-byte reply", out.len());
            return Ok(());
        }
        stream.write_all(&out).await?;
    }
}
