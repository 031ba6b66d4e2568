use std::time::Duration;

/// Sent by the server once per connection to signal it is ready.
pub const HANDSHAKE_BYTE: u8 = b'*';

/// Opens a request frame.
pub const FRAME_START: u8 = b'^';

/// Closes a request frame.
pub const FRAME_END: u8 = b'$';

/// Payload byte used when nothing else is configured. Servers answer with `b'b'`.
pub const DEFAULT_FILLER: u8 = b'a';

pub const DEFAULT_TARGET: &str = "localhost:9090";
pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_PAYLOAD_SIZE: usize = 64;

/// Bound on establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on waiting for the handshake byte.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of equal-width bins in the latency histogram.
pub const HISTOGRAM_BINS: usize = 10;
