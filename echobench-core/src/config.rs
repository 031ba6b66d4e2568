use crate::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DURATION, DEFAULT_FILLER,
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PAYLOAD_SIZE, DEFAULT_TARGET,
};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Everything a run needs to know. Shared read-only by every worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// `host:port` of the server under test.
    pub target: String,
    pub concurrency: NonZeroUsize,
    pub duration: Duration,
    pub payload_size: usize,
    pub filler: u8,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Treat a missing handshake byte as a failure instead of moving on without it.
    pub strict_handshake: bool,
}

impl RunConfig {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            concurrency: NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            duration: DEFAULT_DURATION,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            filler: DEFAULT_FILLER,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            strict_handshake: false,
        }
    }

    pub fn concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn filler(mut self, filler: u8) -> Self {
        self.filler = filler;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn strict_handshake(mut self, strict: bool) -> Self {
        self.strict_handshake = strict;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target={}, concurrency={}, duration={}, payload={}B",
            self.target,
            self.concurrency,
            humantime::format_duration(self.duration),
            self.payload_size,
        )
    }
}
