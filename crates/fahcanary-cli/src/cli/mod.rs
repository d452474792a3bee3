//! CLI for the FAHClient canary.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fahcanary_core::config;
use fahcanary_core::logging::{self, LogSink};
use std::path::PathBuf;

use commands::{run_check, run_init_config, CheckOptions};

pub const EXIT_OK: i32 = 0;
pub const EXIT_CHECK_FAILED: i32 = 1;
pub const EXIT_STARTUP_FAILURE: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

/// Top-level CLI for the canary.
#[derive(Debug, Parser)]
#[command(name = "fahcanary")]
#[command(about = "Check that a FAHClient command socket is up and greeting", long_about = None)]
pub struct Cli {
    /// Write logs to this file instead of the XDG state directory.
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "log_stdout")]
    pub log_file: Option<PathBuf>,

    /// Write logs to stdout.
    #[arg(long, global = true)]
    pub log_stdout: bool,

    /// Path to config.json (default: XDG config directory).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Connect to each target and wait for the FAHClient greeting.
    Check {
        /// Target host:port; repeat for several targets (default: from config).
        #[arg(long = "address", value_name = "HOST:PORT")]
        addresses: Vec<String>,
        /// Dial attempts per target, including the first.
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
        /// Per-attempt dial timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Keep retrying when the connection is refused.
        #[arg(long)]
        retry_refused: bool,
        /// Cancel the remaining targets as soon as one fails.
        #[arg(long)]
        fail_fast: bool,
    },

    /// Write the default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    fn log_sink(&self) -> LogSink {
        if self.log_stdout {
            return LogSink::Stdout;
        }
        LogSink::file_or_fallback(self.log_file.clone(), logging::default_log_path)
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(config::config_path()?),
        }
    }

    /// Set up logging and config, then dispatch. Returns the process exit code.
    pub async fn run(self) -> Result<i32> {
        // If the XDG state dir is unusable, log to stdout rather than not at all.
        let sink = self.log_sink();
        let _session = logging::init_logging(&sink).context("failed to set up logging")?;

        let config_path = self.config_path()?;
        match self.command {
            CliCommand::Check {
                addresses,
                max_attempts,
                timeout,
                retry_refused,
                fail_fast,
            } => {
                let cfg = config::load_or_init(&config_path).with_context(|| {
                    format!("failed to load config from {}", config_path.display())
                })?;
                tracing::debug!("loaded config: {:?}", cfg);
                let opts = CheckOptions {
                    addresses,
                    max_attempts,
                    timeout_secs: timeout,
                    retry_refused,
                    fail_fast,
                };
                let summary = run_check(&cfg, opts).await?;
                Ok(summary.exit_code())
            }
            CliCommand::InitConfig { force } => {
                run_init_config(&config_path, force)?;
                Ok(EXIT_OK)
            }
        }
    }
}
