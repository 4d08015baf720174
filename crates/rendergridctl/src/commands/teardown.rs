//! `rendergridctl teardown` — delete a job and its pool.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use rendergrid_jobs::JobOrchestrator;
use rendergrid_pools::PoolManager;

use super::{load_config, open_backend};

pub async fn teardown(config_path: &Path, data_dir: &Path, job_id: &str, pool_id: &str) -> Result<()> {
    let config = Arc::new(load_config(config_path)?);
    let store = open_backend(data_dir)?;
    let jobs = JobOrchestrator::new(PoolManager::new(Arc::new(store), config));

    let summary = jobs.teardown(job_id, pool_id).await?;
    println!(
        "job {job_id}: {}",
        if summary.job_deleted { "deleted" } else { "not found" }
    );
    println!(
        "pool {pool_id}: {}",
        if summary.pool_deleted { "deleted" } else { "not found" }
    );
    Ok(())
}
