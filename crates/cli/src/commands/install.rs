//! Deploy rendered configs over SSH

use anyhow::bail;
use std::path::Path;
use tracing::error;
use wgmesh_common::{ConfigDocument, Deployer, Inventory};

/// Deploy each selected host's rendered artifact.
///
/// Failures are isolated per host: every host is attempted, then the
/// command exits non-zero listing the ones that failed. Local artifacts
/// are never rolled back.
pub async fn execute(
    inventory_path: &Path,
    dist_dir: &Path,
    hosts: Option<&[String]>,
) -> anyhow::Result<()> {
    let inventory = Inventory::load(inventory_path).await?;
    let selected = inventory.select(hosts)?;
    let deployer = Deployer::new();

    let mut failed = Vec::new();
    for host in &selected {
        let artifact = ConfigDocument::artifact_path(dist_dir, &host.id);
        if !artifact.exists() {
            error!(
                "no rendered config for {} at {} (run --generate first)",
                host.id,
                artifact.display()
            );
            failed.push(host.id.clone());
            continue;
        }
        if let Err(e) = deployer.deploy(host, &artifact).await {
            error!("{}", e);
            failed.push(host.id.clone());
        }
    }

    if !failed.is_empty() {
        bail!("deployment failed for: {}", failed.join(", "));
    }
    Ok(())
}
