use echobench_core::FrameError;
use std::io;
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Everything that can end a worker early. None of them are retried, and all of them count the
/// same towards the run's error total.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to connect: {0}")]
    Connect(#[source] io::Error),

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Failed to read handshake: {0}")]
    Handshake(#[source] io::Error),

    #[error("No handshake byte within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Failed to write request: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to read response: {0}")]
    Read(#[from] FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connect,
    Handshake,
    Write,
    Read,
}

impl WorkerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connect(_) | Self::ConnectTimeout(_) => FailureKind::Connect,
            Self::Handshake(_) | Self::HandshakeTimeout(_) => FailureKind::Handshake,
            Self::Write(_) => FailureKind::Write,
            Self::Read(_) => FailureKind::Read,
        }
    }
}

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Latency sample Mutex is poisoned.")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for AggregatorError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on results file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("Malformed results row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("No results to plot")]
    NoData,
}
