//! Host inventory loading and validation
//!
//! The inventory is a YAML document mapping host ids to reachability
//! metadata. It is loaded once per run, validated up front, and frozen:
//! every component receives it as an immutable value. Document order of
//! the mapping is preserved so generated output is deterministic.

use crate::error::{Error, Result};
use crate::types::{Endpoint, HostRecord, SshTarget};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// On-disk shape of one inventory entry (host id is the mapping key).
#[derive(Debug, Deserialize)]
struct RawHost {
    /// Mesh-internal endpoint, `wg0` in the inventory file
    #[serde(alias = "wg0")]
    mesh: Endpoint,
    lan: Option<Endpoint>,
    internet: Option<Endpoint>,
    os: Option<String>,
    #[serde(default)]
    exclude: BTreeSet<String>,
    ssh: Option<SshTarget>,
}

#[derive(Debug, Deserialize)]
struct RawInventory {
    hosts: serde_yaml::Mapping,
}

/// The frozen, validated host inventory for one run.
#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: Vec<HostRecord>,
}

impl Inventory {
    /// Load and validate an inventory file.
    ///
    /// Malformed entries fail the whole run before any config is generated;
    /// a partially generated mesh is worse than none.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).await.map_err(|e| {
            Error::Inventory(format!("cannot read {}: {}", path.display(), e))
        })?;
        let inventory = Self::parse(&text)?;
        debug!(
            "Loaded inventory from {} ({} hosts)",
            path.display(),
            inventory.len()
        );
        Ok(inventory)
    }

    /// Parse and validate inventory text. Mapping order becomes host order.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawInventory = serde_yaml::from_str(text)?;

        let mut hosts = Vec::with_capacity(raw.hosts.len());
        let mut seen = BTreeSet::new();
        for (key, value) in raw.hosts {
            let id = key
                .as_str()
                .ok_or_else(|| Error::Inventory(format!("non-string host id: {:?}", key)))?
                .to_string();
            if !is_valid_id(&id) {
                return Err(Error::Inventory(format!(
                    "host id {:?} contains characters outside [A-Za-z0-9_.-]",
                    id
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(Error::Inventory(format!("duplicate host id {:?}", id)));
            }

            let raw_host: RawHost = serde_yaml::from_value(value).map_err(|e| {
                Error::Inventory(format!("host {}: {}", id, e))
            })?;
            hosts.push(HostRecord {
                id,
                lan: raw_host.lan,
                internet: raw_host.internet,
                mesh: raw_host.mesh,
                os: raw_host.os.unwrap_or_else(|| "linux".to_string()),
                exclude: raw_host.exclude,
                ssh: raw_host.ssh,
            });
        }

        let inventory = Self { hosts };
        inventory.validate()?;
        Ok(inventory)
    }

    fn validate(&self) -> Result<()> {
        for host in &self.hosts {
            if host.lan.is_none() && host.internet.is_none() {
                return Err(Error::InvalidHostRecord {
                    host: host.id.clone(),
                    reason: "neither lan nor internet reachability is declared".to_string(),
                });
            }
            for excluded in &host.exclude {
                if self.get(excluded).is_none() {
                    warn!(
                        "host {} excludes unknown host {:?}",
                        host.id, excluded
                    );
                }
            }
        }
        Ok(())
    }

    /// Hosts in inventory document order.
    pub fn hosts(&self) -> impl Iterator<Item = &HostRecord> {
        self.hosts.iter()
    }

    /// Look up a host by id.
    pub fn get(&self, id: &str) -> Option<&HostRecord> {
        self.hosts.iter().find(|h| h.id == id)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Resolve a `--hosts` filter to inventory records, preserving inventory
    /// order. `None` selects every host; an unknown id fails the run.
    pub fn select(&self, filter: Option<&[String]>) -> Result<Vec<&HostRecord>> {
        match filter {
            None => Ok(self.hosts.iter().collect()),
            Some(ids) => {
                for id in ids {
                    if self.get(id).is_none() {
                        return Err(Error::Inventory(format!(
                            "unknown host {:?} in --hosts filter",
                            id
                        )));
                    }
                }
                Ok(self
                    .hosts
                    .iter()
                    .filter(|h| ids.iter().any(|id| *id == h.id))
                    .collect())
            }
        }
    }
}

/// Host ids become key-storage directory names, so keep them to a safe set.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
