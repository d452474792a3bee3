//! `fahcanary init-config` – write the default config file.

use anyhow::{bail, Result};
use fahcanary_core::config::{self, AppConfig};
use std::path::Path;

pub fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    config::write_to_path(path, &AppConfig::default())?;
    tracing::info!("wrote default config to {}", path.display());
    println!("Wrote default config to {}", path.display());
    Ok(())
}
