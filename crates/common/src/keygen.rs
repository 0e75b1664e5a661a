//! External key-generation capability
//!
//! Key material is produced by the `wg` tool (`wg genkey`, `wg pubkey`,
//! `wg genpsk`) and treated as opaque base64 strings. The trait seam lets
//! tests substitute a deterministic generator.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Produces WireGuard key material.
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Generate a fresh private key.
    async fn private_key(&self) -> Result<String>;

    /// Derive the public key belonging to `private_key`.
    async fn public_key(&self, private_key: &str) -> Result<String>;

    /// Generate a fresh preshared key.
    async fn preshared_key(&self) -> Result<String>;
}

/// Key generation backed by the `wg` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct WgTool;

impl WgTool {
    /// Verify once at startup that the `wg` binary can be invoked at all.
    ///
    /// Absence is a fatal precondition for the whole run, never retried.
    pub async fn probe() -> Result<Self> {
        let status = Command::new("wg")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|_| Error::ToolUnavailable("wg binary not found in PATH".to_string()))?;
        if !status.success() {
            return Err(Error::ToolUnavailable(format!(
                "wg --version exited with {}",
                status
            )));
        }
        debug!("wg tool available");
        Ok(Self)
    }

    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let mut cmd = Command::new("wg");
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|_| Error::ToolUnavailable("wg binary not found in PATH".to_string()))?;

        if let Some(input) = stdin {
            let mut handle = child
                .stdin
                .take()
                .ok_or_else(|| Error::ToolUnavailable("wg stdin unavailable".to_string()))?;
            handle.write_all(input.as_bytes()).await?;
            handle.write_all(b"\n").await?;
            drop(handle);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::ToolUnavailable(format!(
                "wg {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Deterministic, call-counting generator for tests.
#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct StubKeyGen {
        private: AtomicUsize,
        public: AtomicUsize,
        preshared: AtomicUsize,
    }

    impl StubKeyGen {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn private_calls(&self) -> usize {
            self.private.load(Ordering::SeqCst)
        }

        pub fn public_calls(&self) -> usize {
            self.public.load(Ordering::SeqCst)
        }

        pub fn preshared_calls(&self) -> usize {
            self.preshared.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyGenerator for StubKeyGen {
        async fn private_key(&self) -> Result<String> {
            let n = self.private.fetch_add(1, Ordering::SeqCst);
            Ok(format!("priv-{}", n))
        }

        async fn public_key(&self, private_key: &str) -> Result<String> {
            self.public.fetch_add(1, Ordering::SeqCst);
            Ok(format!("pub-of-{}", private_key))
        }

        async fn preshared_key(&self) -> Result<String> {
            let n = self.preshared.fetch_add(1, Ordering::SeqCst);
            Ok(format!("psk-{}", n))
        }
    }
}

#[async_trait]
impl KeyGenerator for WgTool {
    async fn private_key(&self) -> Result<String> {
        self.run(&["genkey"], None).await
    }

    async fn public_key(&self, private_key: &str) -> Result<String> {
        self.run(&["pubkey"], Some(private_key)).await
    }

    async fn preshared_key(&self) -> Result<String> {
        self.run(&["genpsk"], None).await
    }
}
