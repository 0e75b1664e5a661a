//! wgmesh Common Library
//!
//! Mesh topology resolution, key-material lifecycle, and per-host
//! configuration synthesis shared by the wgmesh tools.

pub mod config;
pub mod deploy;
pub mod error;
pub mod inventory;
pub mod keygen;
pub mod keystore;
pub mod topology;
pub mod types;

// Re-export commonly used types
pub use config::ConfigDocument;
pub use deploy::{Deployer, RemoteShell};
pub use error::{Error, Result};
pub use inventory::Inventory;
pub use keygen::{KeyGenerator, WgTool};
pub use keystore::KeyStore;
pub use types::{Endpoint, HostRecord, KeyPair, PeerDescriptor, ReachabilityClass, SshTarget};

/// wgmesh version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// UDP port every mesh member listens on
pub const LISTEN_PORT: u16 = 56709;

/// Persistent keepalive interval in seconds for NAT-traversing peers
pub const KEEPALIVE_SECS: u16 = 25;

/// File name of the rendered per-host configuration
pub const CONFIG_FILE_NAME: &str = "wg0.conf";
