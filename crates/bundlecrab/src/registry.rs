use async_std::sync::Mutex;
use async_trait::async_trait;
use bundlecrab_core::manifest::ModelSpec;
use bundlecrab_core::InstallError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Durable record of which specs are fully installed.
#[async_trait]
pub trait InstallRegistry: Send + Sync {
    async fn is_installed(&self, spec: &ModelSpec) -> Result<bool, InstallError>;

    /// Marks every file of `spec` as installed in one step.
    async fn commit(&self, spec: &ModelSpec) -> Result<(), InstallError>;

    /// Forgets `spec`. Removing an unknown spec is not an error.
    async fn remove(&self, spec: &ModelSpec) -> Result<(), InstallError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledEntry {
    pub name: String,
    pub files: Vec<String>,
}

impl InstalledEntry {
    fn for_spec(spec: &ModelSpec) -> Self {
        Self {
            name: spec.name.clone(),
            files: spec.filenames().map(str::to_string).collect(),
        }
    }

    /// A record only counts if it lists every file the spec needs now.
    fn covers(&self, spec: &ModelSpec) -> bool {
        self.name == spec.name
            && spec
                .filenames()
                .all(|needed| self.files.iter().any(|f| f == needed))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    installed: Vec<InstalledEntry>,
}

/// Registry persisted as a small TOML file.
///
/// Writes go to a sibling temp file that is renamed over the real one, so a
/// reader sees either the old or the new set of entries.
pub struct TomlRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entries(&self) -> Result<Vec<InstalledEntry>, InstallError> {
        Ok(self.load().await?.installed)
    }

    async fn load(&self) -> Result<RegistryFile, InstallError> {
        let content = match async_std::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RegistryFile::default()),
            Err(e) => {
                return Err(InstallError::Registry(format!(
                    "read {:?}: {}",
                    self.path, e
                )))
            }
        };
        toml::from_str(&content)
            .map_err(|e| InstallError::Registry(format!("parse {:?}: {}", self.path, e)))
    }

    async fn save(&self, file: &RegistryFile) -> Result<(), InstallError> {
        let content = toml::to_string(file)
            .map_err(|e| InstallError::Registry(format!("serialize registry: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            async_std::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallError::Registry(format!("create {:?}: {}", parent, e)))?;
        }

        let staging = self.path.with_extension("toml.tmp");
        async_std::fs::write(&staging, content)
            .await
            .map_err(|e| InstallError::Registry(format!("write {:?}: {}", staging, e)))?;
        async_std::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| InstallError::Registry(format!("replace {:?}: {}", self.path, e)))
    }
}

#[async_trait]
impl InstallRegistry for TomlRegistry {
    async fn is_installed(&self, spec: &ModelSpec) -> Result<bool, InstallError> {
        let file = self.load().await?;
        Ok(file.installed.iter().any(|entry| entry.covers(spec)))
    }

    async fn commit(&self, spec: &ModelSpec) -> Result<(), InstallError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;

        let entry = InstalledEntry::for_spec(spec);
        if let Some(pos) = file.installed.iter().position(|e| e.name == entry.name) {
            file.installed[pos] = entry;
        } else {
            file.installed.push(entry);
        }

        self.save(&file).await
    }

    async fn remove(&self, spec: &ModelSpec) -> Result<(), InstallError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;

        let before = file.installed.len();
        file.installed.retain(|entry| entry.name != spec.name);
        if file.installed.len() == before {
            return Ok(());
        }

        self.save(&file).await
    }
}

/// Process-local registry, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Mutex<HashMap<String, InstalledEntry>>,
    commits: AtomicUsize,
    lookups: AtomicUsize,
    fail_commits: AtomicBool,
    fail_removes: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl InstallRegistry for MemoryRegistry {
    async fn is_installed(&self, spec: &ModelSpec) -> Result<bool, InstallError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&spec.name)
            .map(|entry| entry.covers(spec))
            .unwrap_or(false))
    }

    async fn commit(&self, spec: &ModelSpec) -> Result<(), InstallError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(InstallError::Registry("commit rejected".to_string()));
        }
        self.entries
            .lock()
            .await
            .insert(spec.name.clone(), InstalledEntry::for_spec(spec));
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, spec: &ModelSpec) -> Result<(), InstallError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(InstallError::Registry("remove rejected".to_string()));
        }
        self.entries.lock().await.remove(&spec.name);
        Ok(())
    }
}
