//! Mesh topology resolution
//!
//! Classifies the directional relationship between every ordered host pair
//! and builds the ordered peer list one host's config is rendered from.
//!
//! The classification is asymmetric: a LAN-resident host dials an
//! internet-only peer directly (and keeps the tunnel alive), while the
//! internet-only peer configures no endpoint for the LAN host and waits
//! for it to initiate.

use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::keystore::KeyStore;
use crate::types::{HostRecord, PeerDescriptor, ReachabilityClass};
use tracing::{debug, trace};

/// Classify how `me` reaches `peer`.
///
/// Returns the reachability class plus whether a persistent keepalive is
/// required in this direction. Keepalive is only needed on the LAN side
/// dialing out to a peer that is not in the LAN; the reverse direction
/// either has a direct path or is the one waiting.
pub fn classify(me: &HostRecord, peer: &HostRecord) -> Result<(ReachabilityClass, bool)> {
    if me.excludes(&peer.id) {
        return Ok((ReachabilityClass::Excluded, false));
    }

    for host in [me, peer] {
        if host.lan.is_none() && host.internet.is_none() {
            return Err(Error::InvalidHostRecord {
                host: host.id.clone(),
                reason: "neither lan nor internet reachability is declared".to_string(),
            });
        }
    }

    let self_in_lan = me.in_lan();
    let peer_in_lan = peer.in_lan();
    let keepalive = self_in_lan && !peer_in_lan;

    if peer_in_lan == self_in_lan || !peer_in_lan {
        // Same side of the LAN boundary, or an unconditionally
        // internet-facing peer: always dialable.
        let endpoint = if peer_in_lan {
            peer.lan.as_ref()
        } else {
            peer.internet.as_ref()
        };
        // Guaranteed by the reachability check above
        let endpoint = endpoint.ok_or_else(|| Error::InvalidHostRecord {
            host: peer.id.clone(),
            reason: "no reachable endpoint".to_string(),
        })?;
        Ok((ReachabilityClass::Direct(endpoint.clone()), keepalive))
    } else {
        // Peer lives in a LAN we cannot see; it must reach us instead.
        Ok((ReachabilityClass::BehindNat, keepalive))
    }
}

/// Build the ordered peer list for `me` against the full inventory.
///
/// Skips `me` itself and everything in `me.exclude`; exclusion is resolved
/// from `me`'s perspective only and does not imply the peer excludes `me`.
/// Iteration follows inventory document order, so identical input yields
/// identical output.
pub async fn build_peers(
    me: &HostRecord,
    inventory: &Inventory,
    keystore: &KeyStore,
) -> Result<Vec<PeerDescriptor>> {
    let mut peers = Vec::new();

    for peer in inventory.hosts() {
        if peer.id == me.id || me.excludes(&peer.id) {
            trace!("{}: skipping {}", me.id, peer.id);
            continue;
        }

        let (reachability, keepalive) = classify(me, peer)?;
        if matches!(reachability, ReachabilityClass::Excluded) {
            // Filtered above; skip defensively if it surfaces anyway.
            continue;
        }

        let peer_keys = keystore.ensure_keypair(&peer.id).await?;
        let preshared_key = keystore.ensure_preshared_key(&me.id, &peer.id).await?;

        peers.push(PeerDescriptor {
            id: peer.id.clone(),
            mesh: peer.mesh.clone(),
            public_key: peer_keys.public_key,
            preshared_key,
            allowed_ips: format!("{}/32", peer.mesh.address),
            reachability,
            keepalive,
        });
    }

    debug!("{}: built {} peer descriptors", me.id, peers.len());
    Ok(peers)
}
