//! # Bundlecrab: The Unpacker
//!
//! **Exactly-once installation of bundled model assets into writable storage.**
//!
//! Model files shipped inside an application bundle are often too large for a
//! single packaged asset, so they are split into `model.bin.part1`,
//! `model.bin.part2`, ... Bundlecrab finds those parts, streams them back
//! together into a private directory, verifies the result, and records the
//! model as installed so later launches skip straight to loading it.
//!
//! ## Core Features
//!
//! - **Part Probing**: Discovers `.partN` sequences by exact-path lookups only; a
//!   missing `.part1` falls back to copying the single blob.
//! - **Streaming Assembly**: Appends one part at a time, then checks the final size
//!   (and SHA-256 when the catalog records one). Failed copies are deleted.
//! - **All-or-Nothing Installs**: A model spec is registered only after every one
//!   of its files is in place; any failure removes all of them.
//! - **Idempotency**: Installed specs are skipped with a single registry lookup.
//!
//! ## Usage
//!
//! ### 1. One-Shot Install
//!
//! ```no_run
//! use std::sync::Arc;
//! use bundlecrab::{DirAssetStore, InstallationCoordinator};
//! use bundlecrab_core::manifest::{ArtifactFile, ModelSpec};
//!
//! #[async_std::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DirAssetStore::new("/opt/app/assets"));
//!     let coordinator = InstallationCoordinator::from_env(store)?;
//!
//!     let spec = ModelSpec::new(
//!         "gemma-3n-e2b",
//!         vec![ArtifactFile::new("asset://models/gemma.task", "gemma.task")],
//!     );
//!
//!     // Copies on the first launch, no-op afterwards.
//!     coordinator.install_if_needed(&spec).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Event-Based Install (Progress Tracking)
//!
//! ```no_run
//! use std::sync::Arc;
//! use bundlecrab::{DirAssetStore, InstallationCoordinator};
//! use bundlecrab_core::manifest::{ArtifactFile, ModelSpec};
//! use bundlecrab_core::protocol::InstallEvent;
//! use futures::StreamExt;
//!
//! #[async_std::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DirAssetStore::new("/opt/app/assets"));
//!     let coordinator = InstallationCoordinator::from_env(store)?;
//!     let spec = ModelSpec::new(
//!         "gemma-3n-e2b",
//!         vec![ArtifactFile::new("asset://models/gemma.task", "gemma.task")],
//!     );
//!
//!     let mut events = coordinator.install_stream(spec);
//!     while let Some(event) = events.next().await {
//!         match event {
//!             InstallEvent::Progress { filename, bytes } => print!("\r{}: {} bytes", filename, bytes),
//!             InstallEvent::Complete(name) => println!("\n{} installed", name),
//!             InstallEvent::Error(err) => eprintln!("\nInstall failed: {}", err),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

/// Streaming copy and concatenation of assets into destination files.
pub mod assemble;

/// Model catalogs loaded from TOML.
pub mod catalog;

mod digest;

/// Spec-level orchestration: skip, validate, copy, commit or roll back.
pub mod install;

/// Destination directories and their configuration.
pub mod paths;

/// Discovery of `.partN` sequences.
pub mod probe;

/// The installed-spec registry.
pub mod registry;

/// Read-only asset stores.
pub mod store;

pub use assemble::{Assembly, StreamAssembler};
pub use catalog::ModelCatalog;
pub use install::{FileOutcome, InstallOutcome, InstallationCoordinator};
pub use paths::{DestinationResolver, InstallDirs};
pub use probe::{detect_parts, PartSequence};
pub use registry::{InstallRegistry, MemoryRegistry, TomlRegistry};
pub use store::{AssetStore, DirAssetStore, MemoryAssetStore};
