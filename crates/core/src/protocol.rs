use serde::{Deserialize, Serialize};

/// Where a spec is in its install lifecycle within this process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstallState {
    NotChecked,
    AlreadyInstalled,
    Installing,
    Installed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstallEvent {
    /// Registry lookup found nothing; installation begins
    Started(String),
    /// Spec was already registered, nothing was copied
    Skipped(String),
    /// Copy of a destination file begins
    FileStarted(String),
    /// A plausible destination file from an earlier attempt was kept
    FileReused(String),
    /// Bytes written so far for a file
    Progress { filename: String, bytes: u64 },
    /// File copied and verified
    FileComplete { filename: String, bytes: u64 },
    /// Every file is in place and the spec is registered
    Complete(String),
    /// Installation failed and was rolled back
    Error(String),
}
