//! `rendergridctl dispatch` — send an action batch file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use rendergrid_dispatch::{Batch, Dispatcher, HttpChannel};

use super::load_config;

pub async fn dispatch(file: &Path, config_path: Option<&Path>, endpoint: Option<&str>) -> Result<()> {
    let endpoint = match (endpoint, config_path) {
        (Some(endpoint), _) => endpoint.to_string(),
        (None, Some(path)) => load_config(path)?
            .dispatch_endpoint()
            .map(str::to_string)
            .with_context(|| format!("{} has no [dispatch].endpoint", path.display()))?,
        (None, None) => anyhow::bail!("pass --endpoint or a --config with [dispatch].endpoint"),
    };

    let raw = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let batch = Batch::from_payload(&raw)
        .with_context(|| format!("{} is not a valid action batch", file.display()))?;

    let channel = HttpChannel::new(&endpoint)?;
    Dispatcher::new(Arc::new(channel)).dispatch(&batch).await?;

    info!(%endpoint, items = batch.len(), "batch sent");
    println!("Dispatched {} action(s) to {endpoint}", batch.len());
    Ok(())
}
