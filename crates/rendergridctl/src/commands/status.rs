//! `rendergridctl status` — pools and nodes known to the local backend.

use std::path::Path;

use anyhow::Result;

use rendergrid_state::BatchBackend;

use super::open_backend;

pub async fn status(data_dir: &Path) -> Result<()> {
    let store = open_backend(data_dir)?;
    let pools = store.list_pools().await?;

    if pools.is_empty() {
        println!("No pools.");
        return Ok(());
    }

    for pool in &pools {
        println!(
            "{} ({}) {:?} {}/{} nodes{}",
            pool.id,
            pool.kind,
            pool.phase(),
            pool.current_dedicated_nodes,
            pool.target_dedicated_nodes,
            pool.resize_error
                .as_deref()
                .map(|e| format!(" error: {e}"))
                .unwrap_or_default()
        );
        for node in store.list_nodes(&pool.id).await? {
            println!(
                "  {} {:?} {}",
                node.id,
                node.state,
                node.ip_address.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}
