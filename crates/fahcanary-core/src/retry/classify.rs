//! Turn raw dial and greeting failures into `DiagnosticError`s.
//!
//! The classifier walks the cause chain layer by layer against a closed set
//! of shapes. Any layer that does not fit degrades to `UnknownErrorShape`
//! with a description of what was actually found; classification itself
//! never fails.

use std::error::Error;
use std::io;

use super::diagnostic::{DiagnosticError, ErrorCategory};
use super::errno::Errno;
use super::error::{DialError, DialTimeout, SyscallError};
use crate::greeting::GreetingError;

type BoxError = Box<dyn Error + Send + Sync + 'static>;
type Layer<'a> = &'a (dyn Error + Send + Sync + 'static);

/// Classify a raw failure. The original error is kept as the diagnostic's cause.
pub fn classify<E: Into<BoxError>>(raw: E) -> DiagnosticError {
    let raw = raw.into();
    let (category, message) = describe(raw.as_ref(), std::any::type_name::<E>());
    DiagnosticError::new(category, message, raw)
}

/// Whether a failed dial should be retried. Refusal only counts as transient
/// when `retry_refused` is set.
pub fn is_transient(err: &DialError, retry_refused: bool) -> bool {
    if err.is_timeout() {
        return true;
    }
    match err.errno() {
        Some(Errno::ConnRefused) => retry_refused,
        Some(code) => code.is_transient(),
        None => false,
    }
}

/// `outer_type` names the caller's error type, the only place a foreign
/// outermost layer can still be identified.
fn describe(err: Layer<'_>, outer_type: &str) -> (ErrorCategory, String) {
    if let Some(dial) = err.downcast_ref::<DialError>() {
        return describe_dial(dial);
    }
    if let Some(greeting) = err.downcast_ref::<GreetingError>() {
        return describe_greeting(greeting);
    }
    let found = match layer_type(err) {
        UNRECOGNIZED => outer_type,
        known => known,
    };
    unknown_shape("network operation", found, err)
}

fn describe_dial(dial: &DialError) -> (ErrorCategory, String) {
    let inner = dial.inner();
    if let Some(timeout) = inner.downcast_ref::<DialTimeout>() {
        return (
            ErrorCategory::ConnectTimeout,
            format!(
                "Connecting to the client at {} timed out after {:?}.",
                dial.addr, timeout.after
            ),
        );
    }
    let Some(syscall) = inner.downcast_ref::<SyscallError>() else {
        return unknown_shape("system call", layer_type(inner), inner);
    };
    let code_layer = syscall.inner();
    let Some(code) = code_layer
        .downcast_ref::<io::Error>()
        .and_then(io::Error::raw_os_error)
    else {
        return unknown_shape("platform error code", layer_type(code_layer), code_layer);
    };

    match Errno::from_raw(code) {
        Errno::ConnRefused => (
            ErrorCategory::RefusedConnection,
            format!(
                "The connection to the client was refused. Ensure the client is running on \
                 host:port {} and that the port is not blocked by a firewall.",
                dial.addr
            ),
        ),
        Errno::TimedOut => (
            ErrorCategory::ConnectTimeout,
            format!("Connecting to the client at {} timed out.", dial.addr),
        ),
        Errno::HostUnreachable | Errno::NetUnreachable => (
            ErrorCategory::Unreachable,
            format!(
                "The client at {} is unreachable ({}). Check the host part of the address.",
                dial.addr,
                Errno::from_raw(code)
            ),
        ),
        Errno::ConnReset | Errno::ConnAborted => (
            ErrorCategory::ConnectionReset,
            format!(
                "The connection to {} was reset while being established.",
                dial.addr
            ),
        ),
        other => (
            ErrorCategory::UnknownSyscallError,
            format!(
                "Don't know how to handle error code {} (raw value {}) from {} while dialing {}.",
                other, code, syscall.syscall, dial.addr
            ),
        ),
    }
}

fn describe_greeting(err: &GreetingError) -> (ErrorCategory, String) {
    match err {
        GreetingError::Timeout { after } => (
            ErrorCategory::ReadTimeout,
            format!(
                "Connected, but the client sent no greeting within {:?}.",
                after
            ),
        ),
        GreetingError::Closed => (
            ErrorCategory::ReadFailed,
            "Connected, but the peer closed the connection before sending a greeting."
                .to_string(),
        ),
        GreetingError::Io(e) => (
            ErrorCategory::ReadFailed,
            format!("Connected, but reading the greeting failed: {}", e),
        ),
        GreetingError::Mismatch { received } => (
            ErrorCategory::ProtocolMismatch,
            format!(
                "Unknown how to handle the response; whatever is listening is not the \
                 FAHClient command server. Received: {:?}",
                String::from_utf8_lossy(received)
            ),
        ),
    }
}

fn unknown_shape(expected: &str, type_name: &str, found: Layer<'_>) -> (ErrorCategory, String) {
    (
        ErrorCategory::UnknownErrorShape,
        format!(
            "Don't know how to handle {} layer: found {} ({:?}): {}",
            expected, type_name, found, found
        ),
    )
}

const UNRECOGNIZED: &str = "unrecognized error";

/// Best-effort type name for a layer; `dyn Error` carries no runtime name.
fn layer_type(err: Layer<'_>) -> &'static str {
    if err.is::<DialError>() {
        "DialError"
    } else if err.is::<SyscallError>() {
        "SyscallError"
    } else if err.is::<DialTimeout>() {
        "DialTimeout"
    } else if err.is::<GreetingError>() {
        "GreetingError"
    } else if err.is::<io::Error>() {
        "std::io::Error"
    } else {
        UNRECOGNIZED
    }
}
