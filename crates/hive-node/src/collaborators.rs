//! Construction of the external collaborators from configuration

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use hive_distribution::{ChainClient, HttpChainClient, MemoryChain};
use hive_storage::{ContentStore, HttpContentStore, WorkStore};
use hive_types::WorkUnit;
use hive_work::{HttpSubmissionChecker, SubmissionChecker};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub fn chain_client(config: &NodeConfig) -> Result<Arc<dyn ChainClient>> {
    match &config.collaborators.rpc_url {
        Some(url) => Ok(Arc::new(
            HttpChainClient::new(url.clone(), config.collaborator_timeout())?
                .with_compressed_accounts(config.collaborators.compressed_accounts),
        )),
        None => {
            warn!("⚠️ No RPC_URL configured, using an empty in-memory chain; every stake check will fail");
            Ok(Arc::new(MemoryChain::new()))
        }
    }
}

pub fn content_store(config: &NodeConfig) -> Result<Arc<dyn ContentStore>> {
    let gateway = config
        .collaborators
        .ipfs_gateway
        .as_ref()
        .context("IPFS_GATEWAY is not configured")?;
    Ok(Arc::new(HttpContentStore::new(
        gateway.clone(),
        config.collaborator_timeout(),
    )?))
}

pub fn submission_checker(config: &NodeConfig) -> Result<Arc<dyn SubmissionChecker>> {
    let url = config
        .collaborators
        .checker_url
        .as_ref()
        .context("CHECKER_URL is not configured")?;
    Ok(Arc::new(HttpSubmissionChecker::new(
        url.clone(),
        config.collaborator_timeout(),
    )?))
}

/// Load a JSON array of work units into the store
pub async fn seed_units(store: &dyn WorkStore, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading work units from {}", path.display()))?;
    let units: Vec<WorkUnit> = serde_json::from_str(&content)
        .with_context(|| format!("parsing work units in {}", path.display()))?;

    let count = units.len();
    for unit in units {
        store.insert_unit(unit).await?;
    }
    info!(count, path = %path.display(), "Work units loaded");
    Ok(count)
}
