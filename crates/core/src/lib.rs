//! Shared value types for `bundlecrab`: model specs and their artifact files,
//! the install error taxonomy, and the event protocol emitted while installing.

pub mod error;
pub mod manifest;
pub mod protocol;

pub use error::{ErrorKind, InstallError};
