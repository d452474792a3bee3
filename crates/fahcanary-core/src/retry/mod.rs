//! Retry and backoff policy, plus error classification.
//!
//! This module owns the slow quadratic backoff schedule, the layered dial
//! error types, the platform errno table, and the classifier that turns a
//! raw failure into a `DiagnosticError` suitable for logging or display.

mod classify;
mod diagnostic;
mod errno;
mod error;
mod policy;

pub use classify::{classify, is_transient};
pub use diagnostic::{DiagnosticError, ErrorCategory};
pub use errno::Errno;
pub use error::{DialError, DialTimeout, SyscallError};
pub use policy::BackoffPolicy;
