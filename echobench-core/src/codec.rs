//! Framing for the echo micro-protocol.
//!
//! A request is `^` + payload + `$`. The response carries no delimiters: it is exactly as many
//! bytes as the request payload, so the client only has to know how many bytes to wait for.
use crate::{FRAME_END, FRAME_START};
use std::cmp::Ordering;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Response ended early: expected {expected} bytes, received {received}")]
    Short { expected: usize, received: usize },

    #[error("Response too long: expected {expected} bytes, received {received}")]
    Overlong { expected: usize, received: usize },

    #[error("Error reading response: {0}")]
    Io(#[from] io::Error),
}

/// A request frame, built once per connection and written as-is for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    bytes: Vec<u8>,
}

impl RequestFrame {
    pub fn new(payload_size: usize, filler: u8) -> Self {
        let mut bytes = Vec::with_capacity(payload_size + 2);
        bytes.push(FRAME_START);
        bytes.resize(payload_size + 1, filler);
        bytes.push(FRAME_END);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..self.bytes.len() - 1]
    }

    /// Number of bytes the server owes in reply to this frame.
    pub fn response_len(&self) -> usize {
        self.bytes.len() - 2
    }
}

/// Build the request frame for `payload_size` bytes of `filler`.
pub fn encode(payload_size: usize, filler: u8) -> RequestFrame {
    RequestFrame::new(payload_size, filler)
}

/// Validate a received response. Only the length is checked; the content belongs to the server.
pub fn decode(raw: &[u8], payload_size: usize) -> Result<&[u8], FrameError> {
    match raw.len().cmp(&payload_size) {
        Ordering::Equal => Ok(raw),
        Ordering::Less => Err(FrameError::Short {
            expected: payload_size,
            received: raw.len(),
        }),
        Ordering::Greater => Err(FrameError::Overlong {
            expected: payload_size,
            received: raw.len(),
        }),
    }
}

/// Read one response into `buf`, which must be sized to the expected response length.
///
/// The stream ending before `buf` is full is a [`FrameError::Short`]; a partial response is
/// never handed back to the caller.
pub async fn read_response<'a, R>(
    reader: &mut R,
    buf: &'a mut [u8],
) -> Result<&'a [u8], FrameError>
where
    R: AsyncRead + Unpin,
{
    let expected = buf.len();
    let mut filled = 0;
    while filled < expected {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => {
                return Err(FrameError::Short {
                    expected,
                    received: filled,
                })
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    decode(&buf[..filled], expected)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum TransformState {
    #[default]
    WaitForMsg,
    InMsg,
}

/// Server side of the protocol.
///
/// Bytes outside a frame are dropped, `^` opens a frame, `$` closes it and every payload byte is
/// answered with the byte one above it. State survives across calls, so frames may arrive split
/// over any number of reads.
#[derive(Debug, Default)]
pub struct FrameTransformer {
    state: TransformState,
}

impl FrameTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `input`, appending the reply bytes it produces to `out`. Returns how many frames
    /// were closed by this chunk.
    pub fn feed(&mut self, input: &[u8], out: &mut Vec<u8>) -> usize {
        let mut closed = 0;
        for &byte in input {
            match self.state {
                TransformState::WaitForMsg => {
                    if byte == FRAME_START {
                        self.state = TransformState::InMsg;
                    }
                }
                TransformState::InMsg if byte == FRAME_END => {
                    self.state = TransformState::WaitForMsg;
                    closed += 1;
                }
                TransformState::InMsg => out.push(byte.wrapping_add(1)),
            }
        }
        closed
    }

    pub fn in_frame(&self) -> bool {
        self.state == TransformState::InMsg
    }
}
