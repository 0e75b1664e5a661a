//! Generate per-host mesh configs

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use wgmesh_common::{topology, ConfigDocument, Inventory, KeyStore, WgTool};

/// Generate configs for the selected hosts.
///
/// Any topology or key error aborts the whole run: a partially generated
/// mesh is worse than none.
pub async fn execute(
    inventory_path: &Path,
    keys_dir: &Path,
    dist_dir: &Path,
    hosts: Option<&[String]>,
) -> anyhow::Result<()> {
    let inventory = Inventory::load(inventory_path).await?;
    let selected = inventory.select(hosts)?;

    // Fatal precondition, checked once before any work.
    let keygen = WgTool::probe()
        .await
        .context("the wg tool is required for key generation")?;
    let keystore = KeyStore::new(keys_dir, Arc::new(keygen));

    for host in &selected {
        let own_keys = keystore.ensure_keypair(&host.id).await?;
        let peers = topology::build_peers(host, &inventory, &keystore).await?;
        let document = ConfigDocument::build(host, peers, &own_keys);
        document
            .write_artifact(dist_dir)
            .await
            .with_context(|| format!("writing config for {}", host.id))?;
    }

    info!("Generated configs for {} host(s)", selected.len());
    Ok(())
}
