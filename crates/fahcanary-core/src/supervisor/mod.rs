//! Connection supervisor: dial with quadratic backoff, check the greeting,
//! and report exactly one terminal result per run.
//!
//! Attempts for one target are strictly sequential. The cancellation token
//! is checked before every attempt and raced against every backoff wait
//! (and, when `cancel_aborts_dial` is set, against the dial itself). Every
//! socket opened by an attempt is either handed to the caller on success or
//! dropped before the result is returned.

mod attempt;
mod dial;

pub use attempt::{AttemptOutcome, ConnectionAttempt, SupervisorState};
pub use dial::{Dialer, TcpDialer};

use std::time::Duration;

use crate::control::CancelToken;
use crate::greeting::GreetingValidator;
use crate::retry::{classify, is_transient, BackoffPolicy, DialError, DiagnosticError};

/// Terminal value of one supervised check.
#[derive(Debug)]
pub enum HandshakeResult {
    Succeeded,
    Failed(DiagnosticError),
    Cancelled,
}

impl HandshakeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, HandshakeResult::Succeeded)
    }
}

/// Like `HandshakeResult`, but a success carries the validated connection.
#[derive(Debug)]
pub enum Handshake<C> {
    Connected(C),
    Failed(DiagnosticError),
    Cancelled,
}

impl<C> Handshake<C> {
    /// Drop the connection (if any) and keep only the outcome.
    pub fn into_result(self) -> HandshakeResult {
        match self {
            Handshake::Connected(conn) => {
                drop(conn);
                HandshakeResult::Succeeded
            }
            Handshake::Failed(diag) => HandshakeResult::Failed(diag),
            Handshake::Cancelled => HandshakeResult::Cancelled,
        }
    }
}

/// Supervisor parameters.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Upper bound on a single dial.
    pub per_attempt_timeout: Duration,
    /// Maximum dial attempts, including the first. Clamped to at least 1.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Treat ECONNREFUSED as transient (useful while the client restarts).
    pub retry_refused: bool,
    /// Let cancellation abort an in-flight dial, not only a pending wait.
    pub cancel_aborts_dial: bool,
    pub greeting: GreetingValidator,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_secs(2),
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
            retry_refused: false,
            cancel_aborts_dial: true,
            greeting: GreetingValidator::default(),
        }
    }
}

/// Drives the attempt loop for one target.
#[derive(Debug, Clone)]
pub struct Supervisor<D = TcpDialer> {
    dialer: D,
    config: SupervisorConfig,
}

impl Supervisor<TcpDialer> {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_dialer(TcpDialer, config)
    }
}

impl<D: Dialer> Supervisor<D> {
    pub fn with_dialer(dialer: D, config: SupervisorConfig) -> Self {
        Self { dialer, config }
    }

    /// Run the check and close the connection once validated.
    pub async fn run(&self, address: &str, cancel: &CancelToken) -> HandshakeResult {
        let result = self.run_with_stream(address, cancel).await.into_result();
        match &result {
            HandshakeResult::Succeeded => {
                tracing::info!(address, "received FAHClient greeting")
            }
            HandshakeResult::Failed(diag) => {
                tracing::error!(address, category = %diag.category(), "{}", diag.message())
            }
            HandshakeResult::Cancelled => tracing::info!(address, "check cancelled"),
        }
        result
    }

    /// Run the check and hand the validated connection to the caller.
    pub async fn run_with_stream(
        &self,
        address: &str,
        cancel: &CancelToken,
    ) -> Handshake<D::Conn> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut state = SupervisorState::Idle;
        let mut index = 0u32;

        loop {
            if cancel.is_cancelled() {
                transition(address, &mut state, SupervisorState::Cancelled);
                return Handshake::Cancelled;
            }
            transition(address, &mut state, SupervisorState::Connecting);

            let attempt = ConnectionAttempt::start(index, address);
            let dialed = if self.config.cancel_aborts_dial {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    r = self.dial_once(address) => Some(r),
                }
            } else {
                Some(self.dial_once(address).await)
            };

            let err = match dialed {
                None => {
                    attempt.finish(AttemptOutcome::Pending, &"cancelled during dial");
                    transition(address, &mut state, SupervisorState::Cancelled);
                    return Handshake::Cancelled;
                }
                Some(Ok(mut conn)) => {
                    attempt.finish(AttemptOutcome::Succeeded, &"");
                    return match self.config.greeting.validate(&mut conn).await {
                        Ok(_) => {
                            transition(address, &mut state, SupervisorState::Succeeded);
                            Handshake::Connected(conn)
                        }
                        Err(e) => {
                            drop(conn);
                            transition(address, &mut state, SupervisorState::Failed);
                            Handshake::Failed(classify(e))
                        }
                    };
                }
                Some(Err(err)) => {
                    attempt.finish(AttemptOutcome::Failed, &err);
                    err
                }
            };

            let exhausted = index + 1 >= max_attempts;
            if exhausted || !is_transient(&err, self.config.retry_refused) {
                if exhausted && max_attempts > 1 {
                    tracing::warn!(address, attempts = max_attempts, "giving up after max attempts");
                }
                transition(address, &mut state, SupervisorState::Failed);
                return Handshake::Failed(classify(err));
            }

            transition(address, &mut state, SupervisorState::Retrying);
            let wait = self.config.backoff.wait(index + 1);
            tracing::info!(address, wait_secs = wait.as_secs_f64(), "retrying after backoff");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    transition(address, &mut state, SupervisorState::Cancelled);
                    return Handshake::Cancelled;
                }
                _ = tokio::time::sleep(wait) => {}
            }
            index += 1;
        }
    }

    async fn dial_once(&self, address: &str) -> Result<D::Conn, DialError> {
        let timeout = self.config.per_attempt_timeout;
        match tokio::time::timeout(timeout, self.dialer.dial(address)).await {
            Ok(r) => r,
            Err(_) => Err(DialError::timed_out(address, timeout)),
        }
    }
}

fn transition(address: &str, state: &mut SupervisorState, to: SupervisorState) {
    debug_assert!(state.can_transition(to), "illegal transition {} -> {}", state, to);
    tracing::trace!(address, from = %state, to = %to, "state");
    *state = to;
}

/// Check `address` with the TCP dialer and default greeting settings.
pub async fn run(
    address: &str,
    per_attempt_timeout: Duration,
    max_attempts: u32,
    cancel: &CancelToken,
) -> HandshakeResult {
    let config = SupervisorConfig {
        per_attempt_timeout,
        max_attempts,
        ..SupervisorConfig::default()
    };
    Supervisor::new(config).run(address, cancel).await
}
