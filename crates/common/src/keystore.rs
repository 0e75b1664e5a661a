//! Durable key-material store
//!
//! Owns per-host keypairs and pairwise preshared keys on disk. Generation
//! is lazy and happens at most once per host or pair: an existing private
//! key is never regenerated (that would silently break every config
//! referencing the old public key), and preshared keys are stored under a
//! canonical pair id so either side of a link resolves to the same secret.
//!
//! Layout under the store root:
//!
//! ```text
//! hosts/<id>/privkey
//! hosts/<id>/pubkey
//! pairs/<a>-<b>/preshared     (a, b sorted lexicographically)
//! ```

use crate::error::{Error, Result};
use crate::keygen::KeyGenerator;
use crate::types::KeyPair;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Filesystem-backed store for mesh key material.
pub struct KeyStore {
    root: PathBuf,
    keygen: Arc<dyn KeyGenerator>,
    // Serializes every check-then-generate sequence so concurrent callers
    // cannot produce two different secrets for the same host or pair.
    gen_lock: Mutex<()>,
}

impl KeyStore {
    /// Create a store rooted at `root`. Construction has no side effects;
    /// directories are created on first ensure.
    pub fn new(root: impl Into<PathBuf>, keygen: Arc<dyn KeyGenerator>) -> Self {
        Self {
            root: root.into(),
            keygen,
            gen_lock: Mutex::new(()),
        }
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_dir(&self, host_id: &str) -> PathBuf {
        self.root.join("hosts").join(host_id)
    }

    /// Canonical id for an unordered host pair: sorted, joined with `-`.
    /// `canonical_pair_id(a, b) == canonical_pair_id(b, a)`.
    pub fn canonical_pair_id(a: &str, b: &str) -> String {
        if a <= b {
            format!("{}-{}", a, b)
        } else {
            format!("{}-{}", b, a)
        }
    }

    fn pair_dir(&self, a: &str, b: &str) -> PathBuf {
        self.root.join("pairs").join(Self::canonical_pair_id(a, b))
    }

    /// Return the keypair for `host_id`, generating it exactly once.
    ///
    /// An existing private key is never regenerated; a missing public key
    /// beside an existing private key is re-derived from it.
    pub async fn ensure_keypair(&self, host_id: &str) -> Result<KeyPair> {
        let _guard = self.gen_lock.lock().await;

        let dir = self.host_dir(host_id);
        let priv_path = dir.join("privkey");
        let pub_path = dir.join("pubkey");

        if priv_path.exists() && pub_path.exists() {
            return Ok(KeyPair {
                private_key: read_key(&priv_path).await?,
                public_key: read_key(&pub_path).await?,
            });
        }

        create_dir(&dir).await?;

        let private_key = if priv_path.exists() {
            read_key(&priv_path).await?
        } else {
            info!("Generating keypair for host {}", host_id);
            let key = self.keygen.private_key().await?;
            write_key(&priv_path, &key).await?;
            key
        };

        let public_key = if pub_path.exists() {
            read_key(&pub_path).await?
        } else {
            debug!("Deriving public key for host {}", host_id);
            let key = self.keygen.public_key(&private_key).await?;
            write_key(&pub_path, &key).await?;
            key
        };

        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    /// Return the preshared key for the unordered pair `{a, b}`, generating
    /// it exactly once. `(a, b)` and `(b, a)` yield the identical secret.
    pub async fn ensure_preshared_key(&self, a: &str, b: &str) -> Result<String> {
        let _guard = self.gen_lock.lock().await;

        let dir = self.pair_dir(a, b);
        let path = dir.join("preshared");

        if path.exists() {
            return read_key(&path).await;
        }

        create_dir(&dir).await?;
        info!(
            "Generating preshared key for pair {}",
            Self::canonical_pair_id(a, b)
        );
        let key = self.keygen.preshared_key().await?;
        write_key(&path, &key).await?;
        Ok(key)
    }

    /// Wipe all generated key material. Idempotent: a missing store root is
    /// not an error.
    pub async fn clean(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                info!("Removed key store at {}", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::KeyStorageIo {
                path: self.root.clone(),
                source: e,
            }),
        }
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

async fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await.map_err(|e| Error::KeyStorageIo {
        path: path.to_path_buf(),
        source: e,
    })
}

async fn read_key(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).await.map_err(|e| Error::KeyStorageIo {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(text.trim().to_string())
}

async fn write_key(path: &Path, key: &str) -> Result<()> {
    fs::write(path, key).await.map_err(|e| Error::KeyStorageIo {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::stub::StubKeyGen;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> (KeyStore, Arc<StubKeyGen>) {
        let keygen = Arc::new(StubKeyGen::new());
        let store = KeyStore::new(tmp.path().join("keys"), keygen.clone());
        (store, keygen)
    }

    #[test]
    fn test_canonical_pair_id_symmetry() {
        assert_eq!(
            KeyStore::canonical_pair_id("alpha", "bravo"),
            KeyStore::canonical_pair_id("bravo", "alpha")
        );
        assert_eq!(KeyStore::canonical_pair_id("bravo", "alpha"), "alpha-bravo");
    }

    #[tokio::test]
    async fn test_ensure_keypair_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (store, keygen) = store(&tmp);

        let first = store.ensure_keypair("alpha").await.unwrap();
        let second = store.ensure_keypair("alpha").await.unwrap();

        assert_eq!(first, second);
        // No second generation call occurred
        assert_eq!(keygen.private_calls(), 1);
    }

    #[tokio::test]
    async fn test_keypairs_distinct_per_host() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);

        let alpha = store.ensure_keypair("alpha").await.unwrap();
        let bravo = store.ensure_keypair("bravo").await.unwrap();
        assert_ne!(alpha.private_key, bravo.private_key);
    }

    #[tokio::test]
    async fn test_missing_public_key_rederived_not_regenerated() {
        let tmp = TempDir::new().unwrap();
        let (store, keygen) = store(&tmp);

        let first = store.ensure_keypair("alpha").await.unwrap();
        fs::remove_file(store.host_dir("alpha").join("pubkey"))
            .await
            .unwrap();

        let second = store.ensure_keypair("alpha").await.unwrap();
        assert_eq!(first.private_key, second.private_key);
        assert_eq!(keygen.private_calls(), 1);
        // Derivation ran again, against the stored private key
        assert_eq!(keygen.public_calls(), 2);
    }

    #[tokio::test]
    async fn test_preshared_key_symmetry() {
        let tmp = TempDir::new().unwrap();
        let (store, keygen) = store(&tmp);

        let ab = store.ensure_preshared_key("alpha", "bravo").await.unwrap();
        let ba = store.ensure_preshared_key("bravo", "alpha").await.unwrap();

        assert_eq!(ab, ba);
        assert_eq!(keygen.preshared_calls(), 1);
    }

    #[tokio::test]
    async fn test_clean_then_regenerate() {
        let tmp = TempDir::new().unwrap();
        let (store, keygen) = store(&tmp);

        store.ensure_keypair("alpha").await.unwrap();
        store.ensure_preshared_key("alpha", "bravo").await.unwrap();

        store.clean().await.unwrap();
        assert!(!store.root().exists());

        // Clean is idempotent
        store.clean().await.unwrap();

        store.ensure_keypair("alpha").await.unwrap();
        // Generation capability was invoked again after the wipe
        assert_eq!(keygen.private_calls(), 2);
    }
}
