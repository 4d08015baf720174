//! `rendergridctl init` — write a starter deployment profile.

use std::path::Path;

use anyhow::{Result, bail};
use tracing::info;

use rendergrid_core::DeploymentConfig;

pub fn init(path: &Path, account: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = DeploymentConfig::scaffold(account);
    std::fs::write(path, config.to_toml_string()?)?;

    info!(path = %path.display(), %account, "deployment profile written");
    println!("Wrote {}. Fill in [batch].account_key before use.", path.display());
    Ok(())
}
