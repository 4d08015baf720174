pub mod capacity;
pub mod dispatch;
pub mod init;
pub mod status;
pub mod teardown;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use rendergrid_core::DeploymentConfig;
use rendergrid_state::StateStore;

/// Load a deployment profile.
pub fn load_config(path: &Path) -> Result<DeploymentConfig> {
    DeploymentConfig::from_file(path)
        .with_context(|| format!("failed to load deployment profile {}", path.display()))
}

/// Open (or create) the local backend under `data_dir`.
pub fn open_backend(data_dir: &Path) -> Result<StateStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("rendergrid.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "local backend opened");
    Ok(store)
}
