//! Error types for wgmesh

use thiserror::Error;

/// Result type alias using wgmesh Error
pub type Result<T> = std::result::Result<T, Error>;

/// wgmesh error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Required tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Invalid host record for {host}: {reason}")]
    InvalidHostRecord { host: String, reason: String },

    #[error("Key storage error at {}: {source}", .path.display())]
    KeyStorageIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("Deployment to {host} failed: {reason}")]
    Deployment { host: String, reason: String },
}

impl Error {
    /// True for errors that are scoped to a single host's deployment and
    /// must not abort processing of sibling hosts.
    pub fn is_per_host(&self) -> bool {
        matches!(self, Error::Deployment { .. })
    }
}
