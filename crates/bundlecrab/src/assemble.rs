use crate::digest::{same_digest, to_hex};
use crate::probe::{detect_parts, PartSequence};
use crate::store::AssetStore;
use async_std::fs::{self, File};
use bundlecrab_core::InstallError;
use futures::AsyncWriteExt;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub bytes_written: u64,
    /// Number of parts concatenated, 0 for a single blob.
    pub parts: usize,
    /// Present when a digest was requested and matched.
    pub sha256: Option<String>,
}

/// Copies a single blob, or concatenates its `.partN` sequence, into a
/// destination file and verifies the result.
///
/// On any failure the destination is removed before the error is returned.
pub struct StreamAssembler<'a> {
    store: &'a dyn AssetStore,
}

impl<'a> StreamAssembler<'a> {
    pub fn new(store: &'a dyn AssetStore) -> Self {
        Self { store }
    }

    pub async fn assemble(
        &self,
        base: &str,
        destination: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<Assembly, InstallError> {
        self.assemble_with_progress(base, destination, expected_sha256, |_| {})
            .await
    }

    /// Like [`assemble`](Self::assemble), calling `progress` with the running
    /// byte total after every write.
    pub async fn assemble_with_progress<F>(
        &self,
        base: &str,
        destination: &Path,
        expected_sha256: Option<&str>,
        mut progress: F,
    ) -> Result<Assembly, InstallError>
    where
        F: FnMut(u64) + Send,
    {
        let result = self
            .assemble_inner(base, destination, expected_sha256, &mut progress)
            .await;

        if let Err(e) = &result {
            log::debug!("Assembly of {:?} failed ({}), discarding it", destination, e);
            discard(destination).await;
        }
        result
    }

    async fn assemble_inner<F>(
        &self,
        base: &str,
        destination: &Path,
        expected_sha256: Option<&str>,
        progress: &mut F,
    ) -> Result<Assembly, InstallError>
    where
        F: FnMut(u64) + Send,
    {
        let parts = detect_parts(self.store, base).await?;
        let mut hasher = expected_sha256.map(|_| Sha256::new());

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallError::io("create destination directory", parent, e))?;
        }

        let bytes_written = if parts.is_single_file() {
            self.copy_single(base, destination, hasher.as_mut(), progress)
                .await?
        } else {
            self.concatenate(&parts, destination, hasher.as_mut(), progress)
                .await?
        };

        let actual = fs::metadata(destination)
            .await
            .map_err(|e| InstallError::io("stat destination", destination, e))?
            .len();
        if actual != bytes_written {
            return Err(InstallError::SizeMismatch {
                path: destination.to_path_buf(),
                expected: bytes_written,
                actual,
            });
        }

        let sha256 = match (expected_sha256, hasher) {
            (Some(expected), Some(hasher)) => {
                let actual = to_hex(&hasher.finalize());
                if !same_digest(expected, &actual) {
                    return Err(InstallError::ChecksumMismatch {
                        path: destination.to_path_buf(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
                Some(actual)
            }
            _ => None,
        };

        Ok(Assembly {
            bytes_written,
            parts: parts.len(),
            sha256,
        })
    }

    async fn copy_single<F>(
        &self,
        base: &str,
        destination: &Path,
        hasher: Option<&mut Sha256>,
        progress: &mut F,
    ) -> Result<u64, InstallError>
    where
        F: FnMut(u64) + Send,
    {
        let bytes = self.store.read(base).await?;
        if let Some(hasher) = hasher {
            hasher.update(&bytes);
        }

        fs::write(destination, &bytes)
            .await
            .map_err(|e| InstallError::io("write destination", destination, e))?;

        let total = bytes.len() as u64;
        log::debug!("Copied {} ({} bytes) to {:?}", base, total, destination);
        progress(total);
        Ok(total)
    }

    async fn concatenate<F>(
        &self,
        parts: &PartSequence,
        destination: &Path,
        mut hasher: Option<&mut Sha256>,
        progress: &mut F,
    ) -> Result<u64, InstallError>
    where
        F: FnMut(u64) + Send,
    {
        let mut file = File::create(destination)
            .await
            .map_err(|e| InstallError::io("create destination", destination, e))?;
        let mut total = 0u64;

        // Index order is the only thing tying the parts together.
        for part in parts.iter() {
            let bytes = self.store.read(part).await?;
            file.write_all(&bytes)
                .await
                .map_err(|e| InstallError::io("append part", destination, e))?;
            if let Some(hasher) = hasher.as_deref_mut() {
                hasher.update(&bytes);
            }
            total += bytes.len() as u64;
            log::debug!("Appended {} ({} bytes, {} total)", part, bytes.len(), total);
            progress(total);
        }

        file.flush()
            .await
            .map_err(|e| InstallError::io("flush destination", destination, e))?;
        file.sync_all()
            .await
            .map_err(|e| InstallError::io("sync destination", destination, e))?;
        drop(file);

        Ok(total)
    }
}

/// Best-effort removal of a destination file; a missing file is fine.
pub(crate) async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {:?}: {}", path, e),
    }
}
