use crate::error::InstallError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path};

/// Scheme token for sources that are read through the bundled asset store.
pub const ASSET_SCHEME: &str = "asset";

/// Suffix placed between a base path and its 1-based part index.
pub const PART_SUFFIX: &str = ".part";

/// Existing files smaller than this are treated as corrupt leftovers.
pub const AUXILIARY_MIN_BYTES: u64 = 64;
pub const WEIGHTS_MIN_BYTES: u64 = 1024 * 1024;

const AUXILIARY_EXTENSIONS: &[&str] = &["json", "txt", "model", "vocab", "yaml", "yml", "toml"];

/// Logical name of part `index` of `base`, e.g. `model.bin.part2`.
pub fn part_path(base: &str, index: usize) -> String {
    format!("{}{}{}", base, PART_SUFFIX, index)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SizeClass {
    /// Tokenizer metadata, configs and other small side files.
    Auxiliary,
    /// Model weights, adapters and other binary payloads.
    Weights,
}

impl SizeClass {
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension {
            Some(ext) if AUXILIARY_EXTENSIONS.contains(&ext.as_str()) => SizeClass::Auxiliary,
            _ => SizeClass::Weights,
        }
    }

    /// Smallest size an already present destination file may have to be reused.
    pub fn min_plausible_bytes(&self) -> u64 {
        match self {
            SizeClass::Auxiliary => AUXILIARY_MIN_BYTES,
            SizeClass::Weights => WEIGHTS_MIN_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacePolicy {
    /// Reuse plausible destination files left by an interrupted install.
    #[default]
    KeepExisting,
    /// Always copy every file again when the spec is not registered.
    AlwaysReplace,
}

/// A scheme-qualified source address such as `asset://models/model.bin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAddress {
    pub scheme: String,
    pub path: String,
}

impl SourceAddress {
    pub fn parse(address: &str) -> Result<Self, InstallError> {
        let subject = || format!("source address `{}`", address);
        let (scheme, path) = address
            .split_once("://")
            .ok_or_else(|| InstallError::validation(subject(), "missing scheme"))?;

        if scheme.is_empty() {
            return Err(InstallError::validation(subject(), "empty scheme"));
        }
        if path.is_empty() {
            return Err(InstallError::validation(subject(), "empty asset path"));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            path: path.to_string(),
        })
    }

    /// Parses `address` and requires the bundled asset scheme.
    pub fn parse_asset(address: &str) -> Result<Self, InstallError> {
        let parsed = Self::parse(address)?;
        if parsed.scheme != ASSET_SCHEME {
            return Err(InstallError::validation(
                format!("source address `{}`", address),
                format!(
                    "unsupported scheme `{}`, expected `{}`",
                    parsed.scheme, ASSET_SCHEME
                ),
            ));
        }
        Ok(parsed)
    }
}

impl std::fmt::Display for SourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Scheme-qualified address in the asset store.
    pub source: String,
    /// File name under the destination root.
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_class: Option<SizeClass>,
    /// Lowercase hex SHA-256 of the assembled file, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArtifactFile {
    pub fn new(source: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            size_class: None,
            sha256: None,
        }
    }

    pub fn with_size_class(mut self, size_class: SizeClass) -> Self {
        self.size_class = Some(size_class);
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into().to_ascii_lowercase());
        self
    }

    pub fn size_class(&self) -> SizeClass {
        self.size_class
            .unwrap_or_else(|| SizeClass::from_filename(&self.filename))
    }

    pub fn min_plausible_bytes(&self) -> u64 {
        self.size_class().min_plausible_bytes()
    }
}

/// A named set of artifacts that is installed and registered as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub files: Vec<ArtifactFile>,
    #[serde(default)]
    pub replace: ReplacePolicy,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, files: Vec<ArtifactFile>) -> Self {
        Self {
            name: name.into(),
            files,
            replace: ReplacePolicy::default(),
        }
    }

    pub fn with_replace(mut self, replace: ReplacePolicy) -> Self {
        self.replace = replace;
        self
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|file| file.filename.as_str())
    }

    /// Checks every file before anything is copied and returns the parsed
    /// asset addresses in file order.
    pub fn validate(&self) -> Result<Vec<SourceAddress>, InstallError> {
        let subject = format!("model spec `{}`", self.name);
        if self.name.trim().is_empty() {
            return Err(InstallError::validation(subject, "name is empty"));
        }
        if self.files.is_empty() {
            return Err(InstallError::validation(subject, "lists no files"));
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(self.files.len());
        for file in &self.files {
            if !is_plain_filename(&file.filename) {
                return Err(InstallError::validation(
                    format!("destination filename `{}`", file.filename),
                    "must be a single path component",
                ));
            }
            if !seen.insert(file.filename.as_str()) {
                return Err(InstallError::validation(
                    subject,
                    format!("destination `{}` is listed twice", file.filename),
                ));
            }
            sources.push(SourceAddress::parse_asset(&file.source)?);
        }
        Ok(sources)
    }
}

/// True when `filename` is one normal path component, so it cannot leave the
/// directory it is joined onto.
pub fn is_plain_filename(filename: &str) -> bool {
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
