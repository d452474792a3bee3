//! Per-attempt bookkeeping and the supervisor state machine.

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

/// Supervisor lifecycle. `Succeeded`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Connecting,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SupervisorState::Succeeded | SupervisorState::Failed | SupervisorState::Cancelled
        )
    }

    pub fn can_transition(self, to: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, to),
            (Idle, Connecting)
                | (Idle, Cancelled)
                | (Connecting, Succeeded)
                | (Connecting, Failed)
                | (Connecting, Retrying)
                | (Connecting, Cancelled)
                | (Retrying, Connecting)
                | (Retrying, Cancelled)
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    Failed,
}

/// One dial attempt. Lives only for the iteration that created it; its
/// outcome is logged and the record dropped.
#[derive(Debug)]
pub struct ConnectionAttempt<'a> {
    pub index: u32,
    pub address: &'a str,
    pub started_at: SystemTime,
    pub outcome: AttemptOutcome,
    clock: Instant,
}

impl<'a> ConnectionAttempt<'a> {
    pub fn start(index: u32, address: &'a str) -> Self {
        tracing::debug!(address, attempt = index + 1, "dialing");
        Self {
            index,
            address,
            started_at: SystemTime::now(),
            outcome: AttemptOutcome::Pending,
            clock: Instant::now(),
        }
    }

    /// Record the outcome and log it. Consumes the attempt.
    pub fn finish(mut self, outcome: AttemptOutcome, detail: &dyn fmt::Display) {
        self.outcome = outcome;
        let elapsed_ms = saturating_millis(self.clock.elapsed());
        let started_at = &self.started_at;
        match self.outcome {
            AttemptOutcome::Succeeded => tracing::info!(
                address = self.address,
                attempt = self.index + 1,
                ?started_at,
                elapsed_ms,
                "connected"
            ),
            AttemptOutcome::Failed => tracing::warn!(
                address = self.address,
                attempt = self.index + 1,
                ?started_at,
                elapsed_ms,
                "dial failed: {}",
                detail
            ),
            AttemptOutcome::Pending => tracing::debug!(
                address = self.address,
                attempt = self.index + 1,
                ?started_at,
                elapsed_ms,
                "attempt abandoned: {}",
                detail
            ),
        }
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
