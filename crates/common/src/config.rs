//! Per-host configuration document
//!
//! Assembles one host's interface block plus its peer blocks into a
//! structured document, renders it to wg-quick syntax, and writes the
//! rendered artifact. Building and rendering are pure; only the artifact
//! sink touches the filesystem.

use crate::error::{Error, Result};
use crate::types::{Endpoint, HostRecord, KeyPair, PeerDescriptor, ReachabilityClass};
use crate::{CONFIG_FILE_NAME, KEEPALIVE_SECS, LISTEN_PORT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Platforms whose wg config lacks an `Address` directive; the interface
/// address is configured out of band (hostname.if on OpenBSD).
const ADDRESSLESS_PLATFORMS: &[&str] = &["openbsd"];

/// One host's full rendered state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub host_id: String,
    pub mesh: Endpoint,
    /// Interface address line, omitted on platforms without the directive
    pub address: Option<String>,
    pub private_key: String,
    pub listen_port: u16,
    /// Peer blocks in inventory order
    pub peers: Vec<PeerDescriptor>,
}

impl ConfigDocument {
    /// Assemble the document for `me`. Pure; no side effects.
    pub fn build(me: &HostRecord, peers: Vec<PeerDescriptor>, own_keys: &KeyPair) -> Self {
        let addressless = ADDRESSLESS_PLATFORMS
            .iter()
            .any(|p| me.os.eq_ignore_ascii_case(p));
        Self {
            host_id: me.id.clone(),
            mesh: me.mesh.clone(),
            address: (!addressless).then(|| me.mesh.address.clone()),
            private_key: own_keys.private_key.clone(),
            listen_port: LISTEN_PORT,
            peers,
        }
    }

    /// Render to wg-quick syntax: one `[Interface]` stanza followed by the
    /// peer stanzas in document order. Pure function of the structure.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("[Interface]\n");
        out.push_str(&format!("# {}.{}\n", self.host_id, self.mesh.domain));
        if let Some(address) = &self.address {
            out.push_str(&format!("Address = {}\n", address));
        }
        out.push_str(&format!("PrivateKey = {}\n", self.private_key));
        out.push_str(&format!("ListenPort = {}\n", self.listen_port));

        for peer in &self.peers {
            out.push('\n');
            out.push_str("[Peer]\n");
            out.push_str(&format!("# {}.{}\n", peer.id, peer.mesh.domain));
            out.push_str(&format!("PublicKey = {}\n", peer.public_key));
            out.push_str(&format!("PresharedKey = {}\n", peer.preshared_key));
            if let ReachabilityClass::Direct(endpoint) = &peer.reachability {
                out.push_str(&format!(
                    "Endpoint = {}:{}\n",
                    endpoint.address, self.listen_port
                ));
            }
            out.push_str(&format!("AllowedIPs = {}\n", peer.allowed_ips));
            if peer.keepalive {
                out.push_str(&format!("PersistentKeepalive = {}\n", KEEPALIVE_SECS));
            }
        }

        out
    }

    /// Path the rendered artifact is written to under `dist_root`.
    pub fn artifact_path(dist_root: &Path, host_id: &str) -> PathBuf {
        dist_root
            .join(host_id)
            .join("etc")
            .join("wireguard")
            .join(CONFIG_FILE_NAME)
    }

    /// Write the rendered artifact, overwriting any previous one.
    pub async fn write_artifact(&self, dist_root: &Path) -> Result<PathBuf> {
        let path = Self::artifact_path(dist_root, &self.host_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, self.render()).await?;
        info!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Remove all rendered artifacts. Idempotent, paired with `KeyStore::clean`.
pub async fn clean_artifacts(dist_root: &Path) -> Result<()> {
    match fs::remove_dir_all(dist_root).await {
        Ok(()) => {
            info!("Removed artifacts at {}", dist_root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
