//! Deployment of rendered configs over SSH
//!
//! Only two abstract remote operations exist: copy one file and run one
//! script. Failures are scoped to the host being deployed and reported to
//! the caller, which continues with the next host; already-written local
//! artifacts are never rolled back.

use crate::error::{Error, Result};
use crate::types::HostRecord;
use crate::CONFIG_FILE_NAME;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

/// Remote-execution seam: copy one file, run one script.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn copy_file(&self, user: &str, host: &str, local: &Path, remote: &str) -> Result<()>;
    async fn run_script(&self, user: &str, host: &str, script: &str) -> Result<()>;
}

/// RemoteShell backed by the system `ssh` and `scp` clients.
#[derive(Debug, Clone, Default)]
pub struct SshShell;

impl SshShell {
    async fn run(host: &str, cmd: &mut Command) -> Result<()> {
        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Deployment {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::Deployment {
                host: host.to_string(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn copy_file(&self, user: &str, host: &str, local: &Path, remote: &str) -> Result<()> {
        let mut cmd = Command::new("scp");
        cmd.arg("-q")
            .arg(local)
            .arg(format!("{}@{}:{}", user, host, remote));
        Self::run(host, &mut cmd).await
    }

    async fn run_script(&self, user: &str, host: &str, script: &str) -> Result<()> {
        let mut cmd = Command::new("ssh");
        cmd.arg(format!("{}@{}", user, host))
            .arg("sh")
            .arg("-e")
            .arg("-c")
            .arg(script);
        Self::run(host, &mut cmd).await
    }
}

/// Uploads a rendered artifact and installs it on the remote host.
pub struct Deployer {
    shell: Arc<dyn RemoteShell>,
}

impl Default for Deployer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deployer {
    pub fn new() -> Self {
        Self::with_shell(Arc::new(SshShell))
    }

    pub fn with_shell(shell: Arc<dyn RemoteShell>) -> Self {
        Self { shell }
    }

    /// Upload `artifact` to `host` and install it: create the config
    /// directory, move the file into place with mode 600, reload the
    /// tunnel. Hosts without an `ssh` entry are skipped.
    pub async fn deploy(&self, host: &HostRecord, artifact: &Path) -> Result<()> {
        let Some(ssh) = &host.ssh else {
            warn!("host {} has no ssh target, skipping deployment", host.id);
            return Ok(());
        };

        info!("Uploading {} to {}", artifact.display(), host.id);
        self.shell
            .copy_file(&ssh.user, &host.id, artifact, CONFIG_FILE_NAME)
            .await?;

        info!("Installing config on {}", host.id);
        let script = install_script(ssh);
        self.shell.run_script(&ssh.user, &host.id, &script).await?;

        Ok(())
    }
}

/// The remote install script: directory creation is idempotent, the config
/// lands with fixed 600 permissions, then the tunnel is reloaded.
fn install_script(ssh: &crate::types::SshTarget) -> String {
    format!(
        "{sudo} mkdir -p {dir}\n\
         {sudo} install -m 600 {file} {dir}/{file}\n\
         rm -f {file}\n\
         {sudo} {restart}\n",
        sudo = ssh.sudo_cmd,
        dir = ssh.config_dir,
        file = CONFIG_FILE_NAME,
        restart = ssh.restart_cmd,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endpoint, SshTarget};
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingShell {
        ops: Mutex<Vec<String>>,
        fail_hosts: Vec<String>,
    }

    impl RecordingShell {
        fn check(&self, host: &str) -> Result<()> {
            if self.fail_hosts.iter().any(|h| h == host) {
                return Err(Error::Deployment {
                    host: host.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteShell for RecordingShell {
        async fn copy_file(
            &self,
            user: &str,
            host: &str,
            local: &Path,
            remote: &str,
        ) -> Result<()> {
            self.check(host)?;
            self.ops.lock().unwrap().push(format!(
                "copy {}@{} {} -> {}",
                user,
                host,
                local.display(),
                remote
            ));
            Ok(())
        }

        async fn run_script(&self, user: &str, host: &str, script: &str) -> Result<()> {
            self.check(host)?;
            self.ops
                .lock()
                .unwrap()
                .push(format!("script {}@{}: {}", user, host, script));
            Ok(())
        }
    }

    fn host(id: &str, ssh: Option<SshTarget>) -> HostRecord {
        HostRecord {
            id: id.to_string(),
            lan: Some(Endpoint {
                address: "192.168.1.10".to_string(),
                domain: "lan.example.net".to_string(),
            }),
            internet: None,
            mesh: Endpoint {
                address: "10.11.0.1".to_string(),
                domain: "mesh.example.net".to_string(),
            },
            os: "linux".to_string(),
            exclude: BTreeSet::new(),
            ssh,
        }
    }

    fn ssh_target() -> SshTarget {
        SshTarget {
            user: "deploy".to_string(),
            sudo_cmd: "doas".to_string(),
            restart_cmd: "rcctl restart wg".to_string(),
            config_dir: "/etc/wireguard".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deploy_uploads_then_installs() {
        let shell = Arc::new(RecordingShell::default());
        let deployer = Deployer::with_shell(shell.clone());

        deployer
            .deploy(&host("alpha", Some(ssh_target())), &PathBuf::from("dist/alpha/wg0.conf"))
            .await
            .unwrap();

        let ops = shell.ops.lock().unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops[0].starts_with("copy deploy@alpha"));
        assert!(ops[1].contains("doas mkdir -p /etc/wireguard"));
        assert!(ops[1].contains("doas install -m 600 wg0.conf /etc/wireguard/wg0.conf"));
        assert!(ops[1].contains("doas rcctl restart wg"));
    }

    #[tokio::test]
    async fn test_host_without_ssh_is_skipped() {
        let shell = Arc::new(RecordingShell::default());
        let deployer = Deployer::with_shell(shell.clone());

        deployer
            .deploy(&host("alpha", None), &PathBuf::from("dist/alpha/wg0.conf"))
            .await
            .unwrap();

        assert!(shell.ops.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_per_host() {
        let shell = Arc::new(RecordingShell {
            fail_hosts: vec!["alpha".to_string()],
            ..Default::default()
        });
        let deployer = Deployer::with_shell(shell.clone());

        let err = deployer
            .deploy(&host("alpha", Some(ssh_target())), &PathBuf::from("x"))
            .await
            .unwrap_err();
        assert!(err.is_per_host());

        // Sibling host still deploys
        deployer
            .deploy(&host("bravo", Some(ssh_target())), &PathBuf::from("x"))
            .await
            .unwrap();
        assert_eq!(shell.ops.lock().unwrap().len(), 2);
    }
}
