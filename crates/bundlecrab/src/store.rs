use async_trait::async_trait;
use bundlecrab_core::InstallError;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Read-only source of bundled bytes, addressed by exact logical path.
///
/// Listing is deliberately not part of the contract, so split artifacts are
/// discovered by probing `{base}.part1`, `{base}.part2`, ... in turn.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Read the full content at `path`. Missing assets yield [`InstallError::NotFound`].
    async fn read(&self, path: &str) -> Result<Vec<u8>, InstallError>;

    /// Whether `path` can be read. The default reads the asset; stores that can
    /// check existence without loading bytes should override it.
    async fn contains(&self, path: &str) -> Result<bool, InstallError> {
        match self.read(path).await {
            Ok(_) => Ok(true),
            Err(InstallError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Serves assets from a directory, e.g. an unpacked application bundle.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &str) -> Result<PathBuf, InstallError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(InstallError::validation(
                format!("asset path `{}`", path),
                "must stay inside the asset root",
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetStore for DirAssetStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, InstallError> {
        let full = self.locate(path)?;
        async_std::fs::read(&full).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                InstallError::NotFound(path.to_string())
            } else {
                InstallError::io("read asset", full.clone(), e)
            }
        })
    }

    async fn contains(&self, path: &str) -> Result<bool, InstallError> {
        let full = self.locate(path)?;
        match async_std::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(InstallError::io("stat asset", full, e)),
        }
    }
}

/// In-memory asset store that counts every access. Used by tests and by
/// embedders that generate assets at runtime.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    read_log: Mutex<Vec<String>>,
    probes: AtomicUsize,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        lock(&self.assets).insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.assets).remove(path)
    }

    /// Make every later read of `path` fail with an I/O error.
    pub fn fail_reads_of(&self, path: impl Into<String>) {
        lock(&self.failing).insert(path.into());
    }

    /// Number of `read` calls served so far, failed ones included.
    pub fn reads(&self) -> usize {
        lock(&self.read_log).len()
    }

    /// Paths passed to `read`, in call order.
    pub fn read_log(&self) -> Vec<String> {
        lock(&self.read_log).clone()
    }

    /// Number of existence checks served so far.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, InstallError> {
        lock(&self.read_log).push(path.to_string());

        if lock(&self.failing).contains(path) {
            return Err(InstallError::io(
                "read asset",
                path,
                io::Error::new(io::ErrorKind::Other, "injected read failure"),
            ));
        }

        lock(&self.assets)
            .get(path)
            .cloned()
            .ok_or_else(|| InstallError::NotFound(path.to_string()))
    }

    async fn contains(&self, path: &str) -> Result<bool, InstallError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.assets).contains_key(path))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
