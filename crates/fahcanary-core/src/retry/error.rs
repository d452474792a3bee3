//! Layered dial error types.
//!
//! A failed dial is reported as up to three nested layers, outermost first:
//! `DialError` (operation + target address) -> `SyscallError` (which system
//! call failed) -> `std::io::Error` carrying the raw OS code. A dial that runs
//! out of time carries `DialTimeout` in place of the syscall layer.

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

use super::errno::Errno;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Network-operation layer: what we tried to do and to whom.
#[derive(Debug)]
pub struct DialError {
    pub op: &'static str,
    pub addr: String,
    source: BoxError,
}

impl DialError {
    pub fn new(op: &'static str, addr: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            addr: addr.into(),
            source: source.into(),
        }
    }

    /// Wrap an OS-level connect failure into the full three-layer chain.
    pub fn connect(addr: impl Into<String>, err: io::Error) -> Self {
        Self::new("dial", addr, SyscallError::new("connect", err))
    }

    /// A dial that did not complete within `after`.
    pub fn timed_out(addr: impl Into<String>, after: Duration) -> Self {
        Self::new("dial", addr, DialTimeout { after })
    }

    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Platform code at the bottom of the chain, if the chain has the
    /// expected shape.
    pub fn errno(&self) -> Option<Errno> {
        self.source
            .downcast_ref::<SyscallError>()
            .and_then(SyscallError::errno)
    }

    pub fn is_timeout(&self) -> bool {
        self.source.is::<DialTimeout>()
    }
}

impl fmt::Display for DialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tcp {}: {}", self.op, self.addr, self.source)
    }
}

impl Error for DialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// OS system-call layer.
#[derive(Debug)]
pub struct SyscallError {
    pub syscall: &'static str,
    source: BoxError,
}

impl SyscallError {
    pub fn new(syscall: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            syscall,
            source: source.into(),
        }
    }

    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn errno(&self) -> Option<Errno> {
        self.source
            .downcast_ref::<io::Error>()
            .and_then(io::Error::raw_os_error)
            .map(Errno::from_raw)
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.syscall, self.source)
    }
}

impl Error for SyscallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// The per-attempt dial deadline elapsed before the connection completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialTimeout {
    pub after: Duration,
}

impl fmt::Display for DialTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i/o timeout after {:?}", self.after)
    }
}

impl Error for DialTimeout {}
