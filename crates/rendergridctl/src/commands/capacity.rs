//! `rendergridctl capacity` — rendering capacity report.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};

use rendergrid_capacity::CapacityPlanner;
use rendergrid_state::PoolKind;

use super::{load_config, open_backend};

pub async fn capacity(config_path: &Path, data_dir: &Path, clients: u64, format: &str) -> Result<()> {
    let config = Arc::new(load_config(config_path)?);
    let store = open_backend(data_dir)?;
    let planner = CapacityPlanner::new(Arc::new(store), Arc::clone(&config));

    let pools = planner.list_pools().await?;
    let rendering_pools = pools.iter().filter(|p| p.kind == PoolKind::Rendering).count();
    let slots = planner.max_rendering_slot_capacity().await?;
    let approaching = planner.is_approaching_capacity(clients).await?;

    match format {
        "json" => {
            let report = serde_json::json!({
                "rendering_pools": rendering_pools,
                "max_rendering_slots": slots,
                "connected_clients": clients,
                "approaching_threshold": config.approaching_threshold(),
                "approaching_capacity": approaching,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "text" => {
            println!("Rendering pools:      {rendering_pools}");
            println!("Max rendering slots:  {slots}");
            println!("Connected clients:    {clients}");
            println!(
                "Approaching capacity: {} (threshold {:.0}%)",
                if approaching { "yes" } else { "no" },
                config.approaching_threshold() * 100.0
            );
        }
        other => bail!("unknown output format: {other} (expected text or json)"),
    }
    Ok(())
}
