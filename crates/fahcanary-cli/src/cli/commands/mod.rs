//! CLI command handlers.

mod check;
mod init_config;

pub use check::{run_check, CheckOptions, CheckSummary};
pub use init_config::run_init_config;

#[cfg(test)]
pub(crate) use check::supervise_targets;
