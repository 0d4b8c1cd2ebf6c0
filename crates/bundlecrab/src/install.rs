use crate::assemble::{discard, StreamAssembler};
use crate::digest::{file_sha256, same_digest};
use crate::paths::{DestinationResolver, InstallDirs};
use crate::registry::{InstallRegistry, TomlRegistry};
use crate::store::AssetStore;
use bundlecrab_core::manifest::{
    is_plain_filename, ArtifactFile, ModelSpec, ReplacePolicy, SourceAddress,
};
use bundlecrab_core::protocol::{InstallEvent, InstallState};
use bundlecrab_core::InstallError;
use futures::channel::mpsc;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// What happened to one file of a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Copied {
        filename: String,
        bytes: u64,
        parts: usize,
    },
    /// A plausible file from an earlier, unregistered attempt was kept.
    Reused { filename: String, bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Installed(Vec<FileOutcome>),
}

/// Installs model specs from the asset store exactly once.
///
/// Callers are expected to serialize calls for the same spec; no file lock
/// is taken.
#[derive(Clone)]
pub struct InstallationCoordinator {
    store: Arc<dyn AssetStore>,
    registry: Arc<dyn InstallRegistry>,
    destinations: Arc<dyn DestinationResolver>,
    states: Arc<Mutex<HashMap<String, InstallState>>>,
}

impl InstallationCoordinator {
    pub fn new(
        store: Arc<dyn AssetStore>,
        registry: Arc<dyn InstallRegistry>,
        destinations: Arc<dyn DestinationResolver>,
    ) -> Self {
        Self {
            store,
            registry,
            destinations,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Coordinator over [`InstallDirs::from_env`] with a [`TomlRegistry`].
    pub fn from_env(store: Arc<dyn AssetStore>) -> Result<Self, InstallError> {
        let dirs = InstallDirs::from_env()?;
        let registry = TomlRegistry::new(dirs.registry_path());
        Ok(Self::new(store, Arc::new(registry), Arc::new(dirs)))
    }

    /// Last known state of `name` in this process.
    pub fn state(&self, name: &str) -> InstallState {
        self.lock_states()
            .get(name)
            .copied()
            .unwrap_or(InstallState::NotChecked)
    }

    pub async fn is_installed(&self, spec: &ModelSpec) -> Result<bool, InstallError> {
        self.registry
            .is_installed(spec)
            .await
            .map_err(|e| e.in_spec(&spec.name, "lookup"))
    }

    pub async fn install_if_needed(&self, spec: &ModelSpec) -> Result<InstallOutcome, InstallError> {
        self.run(spec, false, &Events::none()).await
    }

    /// Runs [`install_if_needed`](Self::install_if_needed) on a background task
    /// and streams its events. The stream ends after `Complete`, `Skipped` or `Error`.
    pub fn install_stream(&self, spec: ModelSpec) -> mpsc::UnboundedReceiver<InstallEvent> {
        let (tx, rx) = mpsc::unbounded();
        let coordinator = self.clone();

        async_std::task::spawn(async move {
            let events = Events::new(tx);
            // Failures are reported on the stream as InstallEvent::Error.
            let _ = coordinator.run(&spec, false, &events).await;
        });

        rx
    }

    /// Drops any existing record and files for `spec`, then installs it again.
    pub async fn reinstall(&self, spec: &ModelSpec) -> Result<InstallOutcome, InstallError> {
        // Cleanup resolves destinations, so a bad spec must stop here.
        if let Err(e) = spec.validate() {
            return Err(self.fail(spec, &Events::none(), e.in_spec(&spec.name, "validate")));
        }
        if let Err(e) = self.registry.remove(spec).await {
            log::warn!("Ignoring registry removal failure for {}: {}", spec.name, e);
        }
        self.remove_files(spec).await;
        self.run(spec, true, &Events::none()).await
    }

    /// Forgets `spec` and deletes its files.
    pub async fn uninstall(&self, spec: &ModelSpec) -> Result<(), InstallError> {
        spec.validate().map_err(|e| e.in_spec(&spec.name, "validate"))?;
        self.registry
            .remove(spec)
            .await
            .map_err(|e| e.in_spec(&spec.name, "uninstall"))?;
        self.remove_files(spec).await;
        self.lock_states().remove(&spec.name);
        log::info!("Uninstalled {}", spec.name);
        Ok(())
    }

    async fn run(
        &self,
        spec: &ModelSpec,
        force: bool,
        events: &Events,
    ) -> Result<InstallOutcome, InstallError> {
        if !force {
            let installed = match self.is_installed(spec).await {
                Ok(installed) => installed,
                Err(e) => return Err(self.fail(spec, events, e)),
            };
            if installed {
                log::trace!("{} is already installed", spec.name);
                self.set_state(&spec.name, InstallState::AlreadyInstalled);
                events.emit(InstallEvent::Skipped(spec.name.clone()));
                return Ok(InstallOutcome::AlreadyInstalled);
            }
        }

        self.set_state(&spec.name, InstallState::Installing);
        events.emit(InstallEvent::Started(spec.name.clone()));
        log::info!("Installing {} ({} files)", spec.name, spec.files.len());

        // Nothing has been copied yet, so a bad spec needs no rollback.
        let sources = match spec.validate() {
            Ok(sources) => sources,
            Err(e) => return Err(self.fail(spec, events, e.in_spec(&spec.name, "validate"))),
        };

        let files = match self.copy_all(spec, &sources, events).await {
            Ok(files) => files,
            Err((operation, e)) => {
                self.remove_files(spec).await;
                return Err(self.fail(spec, events, e.in_spec(&spec.name, operation)));
            }
        };

        if let Err(e) = self.registry.commit(spec).await {
            self.remove_files(spec).await;
            return Err(self.fail(spec, events, e.in_spec(&spec.name, "commit")));
        }

        self.set_state(&spec.name, InstallState::Installed);
        events.emit(InstallEvent::Complete(spec.name.clone()));
        log::info!("Installed {}", spec.name);
        Ok(InstallOutcome::Installed(files))
    }

    async fn copy_all(
        &self,
        spec: &ModelSpec,
        sources: &[SourceAddress],
        events: &Events,
    ) -> Result<Vec<FileOutcome>, (&'static str, InstallError)> {
        let assembler = StreamAssembler::new(self.store.as_ref());
        let mut outcomes = Vec::with_capacity(spec.files.len());

        for (file, source) in spec.files.iter().zip(sources) {
            let destination = self.destinations.resolve(&file.filename);

            let existing = self
                .reusable_size(spec.replace, file, &destination)
                .await
                .map_err(|e| ("inspect", e))?;
            if let Some(bytes) = existing {
                log::info!("Keeping existing {:?} ({} bytes)", destination, bytes);
                events.emit(InstallEvent::FileReused(file.filename.clone()));
                outcomes.push(FileOutcome::Reused {
                    filename: file.filename.clone(),
                    bytes,
                });
                continue;
            }

            events.emit(InstallEvent::FileStarted(file.filename.clone()));
            log::debug!("Copying {} to {:?}", source, destination);

            let assembly = assembler
                .assemble_with_progress(
                    &source.path,
                    &destination,
                    file.sha256.as_deref(),
                    |bytes| {
                        events.emit(InstallEvent::Progress {
                            filename: file.filename.clone(),
                            bytes,
                        })
                    },
                )
                .await
                .map_err(|e| ("assemble", e))?;

            events.emit(InstallEvent::FileComplete {
                filename: file.filename.clone(),
                bytes: assembly.bytes_written,
            });
            outcomes.push(FileOutcome::Copied {
                filename: file.filename.clone(),
                bytes: assembly.bytes_written,
                parts: assembly.parts,
            });
        }

        Ok(outcomes)
    }

    /// Size of a destination file that can stand in for a fresh copy. Files
    /// that cannot are deleted here.
    async fn reusable_size(
        &self,
        replace: ReplacePolicy,
        file: &ArtifactFile,
        destination: &Path,
    ) -> Result<Option<u64>, InstallError> {
        let len = match async_std::fs::metadata(destination).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(InstallError::io("stat destination", destination, e)),
        };

        let keep = match replace {
            ReplacePolicy::AlwaysReplace => false,
            ReplacePolicy::KeepExisting if len < file.min_plausible_bytes() => {
                log::warn!(
                    "Discarding {:?}: {} bytes is below the {} byte minimum",
                    destination,
                    len,
                    file.min_plausible_bytes()
                );
                false
            }
            ReplacePolicy::KeepExisting => match &file.sha256 {
                Some(expected) => {
                    let actual = file_sha256(destination).await?;
                    same_digest(expected, &actual)
                }
                None => true,
            },
        };

        if keep {
            return Ok(Some(len));
        }
        async_std::fs::remove_file(destination)
            .await
            .map_err(|e| InstallError::io("remove stale destination", destination, e))?;
        Ok(None)
    }

    /// Best-effort removal of every destination file of `spec`. Filenames that
    /// could resolve outside the destination directory are never touched.
    async fn remove_files(&self, spec: &ModelSpec) {
        for file in &spec.files {
            if !is_plain_filename(&file.filename) {
                log::warn!("Not removing {:?}: not a plain filename", file.filename);
                continue;
            }
            discard(&self.destinations.resolve(&file.filename)).await;
        }
    }

    fn fail(&self, spec: &ModelSpec, events: &Events, error: InstallError) -> InstallError {
        log::warn!("Install of {} failed: {}", spec.name, error.root());
        self.set_state(&spec.name, InstallState::Failed);
        events.emit(InstallEvent::Error(format!("{}: {}", error, error.root())));
        error
    }

    fn set_state(&self, name: &str, state: InstallState) {
        self.lock_states().insert(name.to_string(), state);
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<String, InstallState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Optional sink for install events; sending never fails the install.
struct Events {
    tx: Option<mpsc::UnboundedSender<InstallEvent>>,
}

impl Events {
    fn none() -> Self {
        Self { tx: None }
    }

    fn new(tx: mpsc::UnboundedSender<InstallEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    fn emit(&self, event: InstallEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.unbounded_send(event);
        }
    }
}
