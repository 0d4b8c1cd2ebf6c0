use bundlecrab_core::InstallError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Maps a destination filename to an absolute path in writable storage.
pub trait DestinationResolver: Send + Sync {
    fn resolve(&self, filename: &str) -> PathBuf;
}

/// Private, per-application directories for installed models and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallDirs {
    home: PathBuf,
    models_dir: PathBuf,
}

impl InstallDirs {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let models_dir = home.join("models");
        Self { home, models_dir }
    }

    pub fn with_models_dir(mut self, models_dir: impl Into<PathBuf>) -> Self {
        self.models_dir = models_dir.into();
        self
    }

    /// `BUNDLECRAB_HOME`, falling back to `<data dir>/bundlecrab`. Models go
    /// to `<home>/models` unless `BUNDLECRAB_MODELS` is set.
    pub fn from_env() -> Result<Self, InstallError> {
        Self::from_sources(
            std::env::var_os("BUNDLECRAB_HOME"),
            std::env::var_os("BUNDLECRAB_MODELS"),
            dirs::data_dir(),
        )
    }

    fn from_sources(
        home: Option<OsString>,
        models: Option<OsString>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, InstallError> {
        let home = match home.filter(|h| !h.is_empty()) {
            Some(home) => PathBuf::from(home),
            None => data_dir
                .ok_or_else(|| {
                    InstallError::Config(
                        "could not find a data directory; set BUNDLECRAB_HOME".to_string(),
                    )
                })?
                .join("bundlecrab"),
        };

        let dirs = Self::new(home);
        Ok(match models.filter(|m| !m.is_empty()) {
            Some(models) => dirs.with_models_dir(PathBuf::from(models)),
            None => dirs,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.home.join("installed.toml")
    }

    /// Optional user catalog overlay.
    pub fn manifest_path(&self) -> PathBuf {
        self.home.join("manifest.toml")
    }
}

impl DestinationResolver for InstallDirs {
    fn resolve(&self, filename: &str) -> PathBuf {
        self.models_dir.join(filename)
    }
}
