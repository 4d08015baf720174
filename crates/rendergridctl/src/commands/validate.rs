//! `rendergridctl validate` — check a deployment profile.

use std::path::Path;

use anyhow::{Result, bail};

use super::load_config;

pub fn validate(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let result = config.validate();

    if !result.is_valid() {
        bail!("{}: {}", config_path.display(), result);
    }
    println!("{}: valid", config_path.display());
    Ok(())
}
