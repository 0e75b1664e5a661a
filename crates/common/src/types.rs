//! Core types for wgmesh

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An address plus the DNS domain it lives under.
///
/// Used for a host's LAN, internet, and mesh-internal reachability entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// IP address (or resolvable name) to dial
    #[serde(alias = "ip")]
    pub address: String,
    /// DNS domain the address belongs to
    pub domain: String,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.address, self.domain)
    }
}

/// Remote-access descriptor consumed by the deployment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshTarget {
    /// Login user on the remote host
    pub user: String,
    /// Privilege-escalation command prefix (e.g. `sudo`, `doas`)
    #[serde(default = "default_sudo_cmd")]
    pub sudo_cmd: String,
    /// Command that reloads the tunnel after install
    pub restart_cmd: String,
    /// Remote directory the config is installed into
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
}

fn default_sudo_cmd() -> String {
    "sudo".to_string()
}

fn default_config_dir() -> String {
    "/etc/wireguard".to_string()
}

/// One mesh member as declared in the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    /// Unique host identifier (inventory key)
    pub id: String,
    /// LAN reachability, present iff the host sits inside the shared LAN
    pub lan: Option<Endpoint>,
    /// Public internet reachability, present iff the host has a public endpoint
    pub internet: Option<Endpoint>,
    /// Mesh-internal address and domain assigned to this host
    pub mesh: Endpoint,
    /// Operating system, drives per-platform config policy
    #[serde(default = "default_os")]
    pub os: String,
    /// Host ids this host will never peer with (asymmetric, per-host)
    #[serde(default)]
    pub exclude: BTreeSet<String>,
    /// Deployment access, absent for hosts that are generated-only
    pub ssh: Option<SshTarget>,
}

fn default_os() -> String {
    "linux".to_string()
}

impl HostRecord {
    /// True if this host sits inside the shared LAN.
    pub fn in_lan(&self) -> bool {
        self.lan.is_some()
    }

    /// True if `peer_id` is excluded from this host's peer list.
    pub fn excludes(&self, peer_id: &str) -> bool {
        self.exclude.contains(peer_id)
    }

    /// The host's dialable endpoint: LAN when present, internet otherwise.
    pub fn reachable_endpoint(&self) -> Option<&Endpoint> {
        self.lan.as_ref().or(self.internet.as_ref())
    }
}

/// A host keypair. Both halves are opaque base64 strings produced by the
/// external key-generation tool; the private key never leaves local storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Directional reachability of a peer from one host's vantage point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "endpoint")]
pub enum ReachabilityClass {
    /// The peer has a concrete address the local host should dial
    Direct(Endpoint),
    /// No local endpoint is configured; the peer is expected to initiate
    BehindNat,
    /// The peer is excluded entirely and gets no peer block
    Excluded,
}

impl ReachabilityClass {
    pub fn is_direct(&self) -> bool {
        matches!(self, ReachabilityClass::Direct(_))
    }
}

/// Everything one `[Peer]` block needs, rendering-ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Peer host id
    pub id: String,
    /// Peer's mesh address/domain, used for the comment header and AllowedIPs
    pub mesh: Endpoint,
    /// Peer's public key
    pub public_key: String,
    /// Preshared key canonically shared between exactly this pair
    pub preshared_key: String,
    /// Peer's mesh address as a single-host CIDR
    pub allowed_ips: String,
    /// How (and whether) the local host dials this peer
    pub reachability: ReachabilityClass,
    /// Whether a persistent keepalive is required toward this peer
    pub keepalive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(id: &str, lan: bool, internet: bool) -> HostRecord {
        HostRecord {
            id: id.to_string(),
            lan: lan.then(|| Endpoint {
                address: "192.168.1.10".to_string(),
                domain: "lan.example.net".to_string(),
            }),
            internet: internet.then(|| Endpoint {
                address: "203.0.113.5".to_string(),
                domain: "example.net".to_string(),
            }),
            mesh: Endpoint {
                address: "10.11.0.1".to_string(),
                domain: "mesh.example.net".to_string(),
            },
            os: "linux".to_string(),
            exclude: BTreeSet::new(),
            ssh: None,
        }
    }

    #[test]
    fn test_reachable_endpoint_prefers_lan() {
        let h = host("alpha", true, true);
        assert_eq!(h.reachable_endpoint().unwrap().address, "192.168.1.10");

        let h = host("bravo", false, true);
        assert_eq!(h.reachable_endpoint().unwrap().address, "203.0.113.5");

        let h = host("kiosk", false, false);
        assert!(h.reachable_endpoint().is_none());
    }

    #[test]
    fn test_peer_descriptor_serializes() {
        let peer = PeerDescriptor {
            id: "bravo".to_string(),
            mesh: Endpoint {
                address: "10.11.0.2".to_string(),
                domain: "mesh.example.net".to_string(),
            },
            public_key: "PUB".to_string(),
            preshared_key: "PSK".to_string(),
            allowed_ips: "10.11.0.2/32".to_string(),
            reachability: ReachabilityClass::BehindNat,
            keepalive: false,
        };
        let json = serde_json::to_string(&peer).unwrap();
        assert!(json.contains("behind_nat"));
        assert!(json.contains("10.11.0.2/32"));
    }

    #[test]
    fn test_keypair_debug_hides_private_key() {
        let kp = KeyPair {
            private_key: "SECRET".to_string(),
            public_key: "PUBLIC".to_string(),
        };
        let dbg = format!("{:?}", kp);
        assert!(dbg.contains("PUBLIC"));
        assert!(!dbg.contains("SECRET"));
    }
}
