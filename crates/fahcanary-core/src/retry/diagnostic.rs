use std::error::Error;
use std::fmt;

/// Closed set of failure categories reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Nothing accepted the connection (ECONNREFUSED).
    RefusedConnection,
    /// The dial did not complete in time.
    ConnectTimeout,
    /// No route to the host or network.
    Unreachable,
    /// The connection was reset or aborted while being established.
    ConnectionReset,
    /// Connected, but no greeting arrived before the read deadline.
    ReadTimeout,
    /// Connected, but reading the greeting failed or the peer hung up.
    ReadFailed,
    /// Connected, but the peer is not speaking the FAHClient protocol.
    ProtocolMismatch,
    /// The error chain had the expected shape but an unknown OS code.
    UnknownSyscallError,
    /// The error chain did not have a shape we know how to read.
    UnknownErrorShape,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::RefusedConnection => "refused-connection",
            ErrorCategory::ConnectTimeout => "connect-timeout",
            ErrorCategory::Unreachable => "unreachable",
            ErrorCategory::ConnectionReset => "connection-reset",
            ErrorCategory::ReadTimeout => "read-timeout",
            ErrorCategory::ReadFailed => "read-failed",
            ErrorCategory::ProtocolMismatch => "protocol-mismatch",
            ErrorCategory::UnknownSyscallError => "unknown-syscall-error",
            ErrorCategory::UnknownErrorShape => "unknown-error-shape",
        };
        f.write_str(s)
    }
}

/// Classified failure: category, operator-facing message, and the raw error
/// it was derived from. Immutable once built.
#[derive(Debug)]
pub struct DiagnosticError {
    category: ErrorCategory,
    message: String,
    cause: Box<dyn Error + Send + Sync + 'static>,
}

impl DiagnosticError {
    pub(crate) fn new(
        category: ErrorCategory,
        message: String,
        cause: Box<dyn Error + Send + Sync + 'static>,
    ) -> Self {
        Self {
            category,
            message,
            cause,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

impl Error for DiagnosticError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}
