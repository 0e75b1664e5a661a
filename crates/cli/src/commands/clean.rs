//! Wipe generated key material and rendered configs

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use wgmesh_common::{config, KeyStore, WgTool};

/// Remove the key store and the dist directory. Both removals are
/// idempotent; a missing directory is not an error.
pub async fn execute(keys_dir: &Path, dist_dir: &Path) -> anyhow::Result<()> {
    // clean never invokes the generator, so an unprobed WgTool is fine
    let keystore = KeyStore::new(keys_dir, Arc::new(WgTool));
    keystore.clean().await?;
    config::clean_artifacts(dist_dir).await?;
    info!("Removed generated keys and configs");
    Ok(())
}
