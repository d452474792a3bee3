//! Platform error codes the classifier and retry loop know about.
//!
//! Codes are enumerated explicitly per platform rather than inferred from
//! `io::ErrorKind`, whose mapping differs between targets and std versions.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    ConnRefused,
    TimedOut,
    ConnReset,
    ConnAborted,
    HostUnreachable,
    NetUnreachable,
    WouldBlock,
    Interrupted,
    /// Any code outside the table above; carries the raw value.
    Other(i32),
}

#[cfg(unix)]
mod codes {
    pub const CONN_REFUSED: i32 = libc::ECONNREFUSED;
    pub const TIMED_OUT: i32 = libc::ETIMEDOUT;
    pub const CONN_RESET: i32 = libc::ECONNRESET;
    pub const CONN_ABORTED: i32 = libc::ECONNABORTED;
    pub const HOST_UNREACHABLE: i32 = libc::EHOSTUNREACH;
    pub const NET_UNREACHABLE: i32 = libc::ENETUNREACH;
    pub const WOULD_BLOCK: i32 = libc::EAGAIN;
    pub const INTERRUPTED: i32 = libc::EINTR;
}

// Winsock codes (WSAE*).
#[cfg(windows)]
mod codes {
    pub const CONN_REFUSED: i32 = 10061;
    pub const TIMED_OUT: i32 = 10060;
    pub const CONN_RESET: i32 = 10054;
    pub const CONN_ABORTED: i32 = 10053;
    pub const HOST_UNREACHABLE: i32 = 10065;
    pub const NET_UNREACHABLE: i32 = 10051;
    pub const WOULD_BLOCK: i32 = 10035;
    pub const INTERRUPTED: i32 = 10004;
}

impl Errno {
    pub fn from_raw(code: i32) -> Self {
        match code {
            codes::CONN_REFUSED => Errno::ConnRefused,
            codes::TIMED_OUT => Errno::TimedOut,
            codes::CONN_RESET => Errno::ConnReset,
            codes::CONN_ABORTED => Errno::ConnAborted,
            codes::HOST_UNREACHABLE => Errno::HostUnreachable,
            codes::NET_UNREACHABLE => Errno::NetUnreachable,
            codes::WOULD_BLOCK => Errno::WouldBlock,
            codes::INTERRUPTED => Errno::Interrupted,
            other => Errno::Other(other),
        }
    }

    /// Whether a dial failing with this code is worth another attempt.
    /// Refusal is listed as permanent; callers may opt in to retrying it.
    pub fn is_transient(self) -> bool {
        match self {
            Errno::TimedOut
            | Errno::ConnReset
            | Errno::ConnAborted
            | Errno::HostUnreachable
            | Errno::NetUnreachable
            | Errno::WouldBlock
            | Errno::Interrupted => true,
            Errno::ConnRefused | Errno::Other(_) => false,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Errno::ConnRefused => write!(f, "ECONNREFUSED"),
            Errno::TimedOut => write!(f, "ETIMEDOUT"),
            Errno::ConnReset => write!(f, "ECONNRESET"),
            Errno::ConnAborted => write!(f, "ECONNABORTED"),
            Errno::HostUnreachable => write!(f, "EHOSTUNREACH"),
            Errno::NetUnreachable => write!(f, "ENETUNREACH"),
            Errno::WouldBlock => write!(f, "EAGAIN"),
            Errno::Interrupted => write!(f, "EINTR"),
            Errno::Other(code) => {
                write!(f, "{}", std::io::Error::from_raw_os_error(*code))
            }
        }
    }
}
