//! `fahcanary check` – supervise one check per target and report results.

use anyhow::{Context, Result};
use fahcanary_core::config::AppConfig;
use fahcanary_core::control::CancelToken;
use fahcanary_core::supervisor::{
    Dialer, HandshakeResult, Supervisor, SupervisorConfig, TcpDialer,
};
use std::time::Duration;

use crate::cli::{EXIT_CANCELLED, EXIT_CHECK_FAILED, EXIT_OK};

#[derive(Debug, Default)]
pub struct CheckOptions {
    pub addresses: Vec<String>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub retry_refused: bool,
    pub fail_fast: bool,
}

/// Per-target results, in the order the targets were given.
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub results: Vec<(String, HandshakeResult)>,
}

impl CheckSummary {
    pub fn exit_code(&self) -> i32 {
        let failed = self
            .results
            .iter()
            .any(|(_, r)| matches!(r, HandshakeResult::Failed(_)));
        let cancelled = self
            .results
            .iter()
            .any(|(_, r)| matches!(r, HandshakeResult::Cancelled));
        if failed {
            EXIT_CHECK_FAILED
        } else if cancelled {
            EXIT_CANCELLED
        } else {
            EXIT_OK
        }
    }
}

pub async fn run_check(cfg: &AppConfig, opts: CheckOptions) -> Result<CheckSummary> {
    let targets = if opts.addresses.is_empty() {
        vec![cfg.fah_client_host_and_port.clone()]
    } else {
        opts.addresses
    };

    let mut sup_cfg = cfg.supervisor_config();
    if let Some(n) = opts.max_attempts {
        sup_cfg.max_attempts = n;
    }
    if let Some(secs) = opts.timeout_secs {
        sup_cfg.per_attempt_timeout = Duration::from_secs(secs);
    }
    sup_cfg.retry_refused |= opts.retry_refused;

    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && cancel.cancel() {
                tracing::warn!("interrupt received, cancelling checks");
            }
        })
    };

    let results = supervise_targets(TcpDialer, &targets, &sup_cfg, &cancel, opts.fail_fast).await;
    interrupt.abort();
    let summary = CheckSummary { results: results? };

    for (address, result) in &summary.results {
        match result {
            HandshakeResult::Succeeded => println!("{address}: OK"),
            HandshakeResult::Failed(diag) => println!("{address}: FAILED {diag}"),
            HandshakeResult::Cancelled => println!("{address}: cancelled"),
        }
    }
    Ok(summary)
}

/// Run one supervisor task per target. With `fail_fast`, the first
/// `Failed` result cancels the shared token so the other targets stop.
pub(crate) async fn supervise_targets<D>(
    dialer: D,
    targets: &[String],
    cfg: &SupervisorConfig,
    cancel: &CancelToken,
    fail_fast: bool,
) -> Result<Vec<(String, HandshakeResult)>>
where
    D: Dialer + Clone + 'static,
{
    let mut handles = Vec::with_capacity(targets.len());
    for address in targets.iter().cloned() {
        let supervisor = Supervisor::with_dialer(dialer.clone(), cfg.clone());
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let result = supervisor.run(&address, &cancel).await;
            if fail_fast && matches!(result, HandshakeResult::Failed(_)) && cancel.cancel() {
                tracing::info!(address = %address, "cancelling remaining checks");
            }
            (address, result)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.context("check task panicked")?);
    }
    Ok(results)
}
