//! Greeting banner check for a freshly accepted connection.
//!
//! A running FAHClient writes a fixed preamble as soon as it accepts a
//! connection on its command port. Reads here are always bounded by a
//! deadline, and bytes consumed from the connection are never re-read.

use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

/// Banner the FAHClient command server sends on accept.
pub const GREETING: &str = "Welcome to the Folding@home Client command server.\n> ";

/// Receive buffer for the greeting.
pub const READ_BUFFER_BYTES: usize = 256;

/// Total time allowed for the greeting to arrive.
pub const READ_DEADLINE: Duration = Duration::from_secs(5);

/// Why a greeting could not be confirmed.
#[derive(Debug)]
pub enum GreetingError {
    /// Nothing arrived before the deadline.
    Timeout { after: Duration },
    /// The peer closed the connection without sending anything.
    Closed,
    /// Bytes arrived but never contained the banner (deadline, EOF or full buffer).
    Mismatch { received: Vec<u8> },
    /// Read failed for another reason.
    Io(io::Error),
}

impl fmt::Display for GreetingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GreetingError::Timeout { after } => {
                write!(f, "no greeting received within {:?}", after)
            }
            GreetingError::Closed => write!(f, "connection closed before greeting"),
            GreetingError::Mismatch { received } => write!(
                f,
                "unexpected greeting ({} bytes): {:?}",
                received.len(),
                String::from_utf8_lossy(received)
            ),
            GreetingError::Io(e) => write!(f, "read: {}", e),
        }
    }
}

impl std::error::Error for GreetingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GreetingError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Reads and checks the greeting banner.
#[derive(Debug, Clone)]
pub struct GreetingValidator {
    expected: Vec<u8>,
    max_bytes: usize,
    window: Duration,
}

impl Default for GreetingValidator {
    fn default() -> Self {
        Self::new(GREETING, READ_BUFFER_BYTES, READ_DEADLINE)
    }
}

impl GreetingValidator {
    pub fn new(expected: impl Into<Vec<u8>>, max_bytes: usize, window: Duration) -> Self {
        Self {
            expected: expected.into(),
            max_bytes: max_bytes.max(1),
            window,
        }
    }

    /// True iff `expected` occurs as a contiguous run anywhere in `received`.
    pub fn matches(received: &[u8], expected: &[u8]) -> bool {
        if expected.is_empty() {
            return true;
        }
        received.windows(expected.len()).any(|w| w == expected)
    }

    /// One read of at most `max_bytes`, bounded by `deadline`. An empty
    /// result means the peer closed the connection.
    pub async fn read_banner<R>(
        conn: &mut R,
        max_bytes: usize,
        deadline: Duration,
    ) -> Result<Vec<u8>, GreetingError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; max_bytes];
        match tokio::time::timeout(deadline, conn.read(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
                Err(GreetingError::Timeout { after: deadline })
            }
            Ok(Err(e)) => Err(GreetingError::Io(e)),
            Err(_) => Err(GreetingError::Timeout { after: deadline }),
        }
    }

    /// Keep reading until the banner shows up, the buffer fills, the peer
    /// closes, or the window runs out. Returns everything received.
    pub async fn validate<R>(&self, conn: &mut R) -> Result<Vec<u8>, GreetingError>
    where
        R: AsyncRead + Unpin,
    {
        let deadline = Instant::now() + self.window;
        let mut received = Vec::with_capacity(self.max_bytes);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.give_up(received));
            }
            let room = self.max_bytes - received.len();
            match Self::read_banner(conn, room, remaining).await {
                Ok(chunk) if chunk.is_empty() => {
                    if received.is_empty() {
                        return Err(GreetingError::Closed);
                    }
                    return Err(GreetingError::Mismatch { received });
                }
                Ok(chunk) => {
                    received.extend_from_slice(&chunk);
                    tracing::trace!(bytes = received.len(), "greeting bytes received");
                    if Self::matches(&received, &self.expected) {
                        return Ok(received);
                    }
                    if received.len() >= self.max_bytes {
                        return Err(GreetingError::Mismatch { received });
                    }
                }
                Err(GreetingError::Timeout { .. }) => return Err(self.give_up(received)),
                Err(e) => return Err(e),
            }
        }
    }

    fn give_up(&self, received: Vec<u8>) -> GreetingError {
        if received.is_empty() {
            GreetingError::Timeout { after: self.window }
        } else {
            GreetingError::Mismatch { received }
        }
    }
}
