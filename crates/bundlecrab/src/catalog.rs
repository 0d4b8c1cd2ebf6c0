use bundlecrab_core::manifest::ModelSpec;
use bundlecrab_core::InstallError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: Vec<ModelSpec>,
}

/// Model specs known to the application, keyed by name.
///
/// Catalogs are layered: each load overlays earlier entries with the same
/// name, so bundled defaults can be followed by a user manifest.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, InstallError> {
        let mut catalog = Self::new();
        catalog.load_str(content)?;
        Ok(catalog)
    }

    pub fn load_str(&mut self, content: &str) -> Result<(), InstallError> {
        let parsed: CatalogFile = toml::from_str(content)
            .map_err(|e| InstallError::Config(format!("parse catalog: {}", e)))?;

        // Reject the whole document before touching existing entries.
        for spec in &parsed.models {
            spec.validate()
                .map_err(|e| InstallError::Config(format!("catalog entry `{}`: {}", spec.name, e)))?;
        }
        for spec in parsed.models {
            self.insert(spec);
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), InstallError> {
        let content = fs::read_to_string(path)
            .map_err(|e| InstallError::Config(format!("read {:?}: {}", path, e)))?;
        self.load_str(&content)
    }

    /// Loads `path` if it exists. Returns whether anything was loaded.
    pub fn load_file_if_exists(&mut self, path: &Path) -> Result<bool, InstallError> {
        if !path.exists() {
            return Ok(false);
        }
        self.load_file(path)?;
        Ok(true)
    }

    pub fn insert(&mut self, spec: ModelSpec) {
        self.models.insert(spec.name.clone(), spec);
    }

    pub fn resolve(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> Vec<&ModelSpec> {
        self.models.values().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundlecrab_core::manifest::{ReplacePolicy, SizeClass};

    const BASE: &str = r#"
[[models]]
name = "gemma-3n-e2b"

[[models.files]]
source = "asset://models/gemma-3n-E2B-it-int4.task"
filename = "gemma-3n-E2B-it-int4.task"

[[models.files]]
source = "asset://models/tokenizer.model"
filename = "tokenizer.model"
size_class = "weights"

[[models]]
name = "embedder"
replace = "always-replace"

[[models.files]]
source = "asset://models/embedder.tflite"
filename = "embedder.tflite"
sha256 = "ab12"
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = ModelCatalog::from_toml_str(BASE).unwrap();
        assert_eq!(catalog.len(), 2);

        let gemma = catalog.resolve("gemma-3n-e2b").unwrap();
        assert_eq!(gemma.replace, ReplacePolicy::KeepExisting);
        assert_eq!(gemma.files.len(), 2);
        assert_eq!(gemma.files[1].size_class(), SizeClass::Weights);

        let embedder = catalog.resolve("embedder").unwrap();
        assert_eq!(embedder.replace, ReplacePolicy::AlwaysReplace);
        assert_eq!(embedder.files[0].sha256.as_deref(), Some("ab12"));

        let names: Vec<_> = catalog.list().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["embedder", "gemma-3n-e2b"]);
    }

    #[test]
    fn test_overlay_replaces_by_name() {
        let mut catalog = ModelCatalog::from_toml_str(BASE).unwrap();
        catalog
            .load_str(
                r#"
[[models]]
name = "embedder"
[[models.files]]
source = "asset://models/embedder-v2.tflite"
filename = "embedder-v2.tflite"
"#,
            )
            .unwrap();

        assert_eq!(catalog.len(), 2);
        let embedder = catalog.resolve("embedder").unwrap();
        assert_eq!(embedder.files[0].filename, "embedder-v2.tflite");
        assert_eq!(embedder.replace, ReplacePolicy::KeepExisting);
    }

    #[test]
    fn test_invalid_entry_rejects_whole_document() {
        let mut catalog = ModelCatalog::from_toml_str(BASE).unwrap();
        let err = catalog
            .load_str(
                r#"
[[models]]
name = "gemma-3n-e2b"
[[models.files]]
source = "https://example.com/model.bin"
filename = "model.bin"
"#,
            )
            .unwrap_err();

        assert!(matches!(err, InstallError::Config(_)));
        let gemma = catalog.resolve("gemma-3n-e2b").unwrap();
        assert_eq!(gemma.files.len(), 2);
    }

    #[test]
    fn test_missing_user_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = ModelCatalog::new();
        assert!(!catalog
            .load_file_if_exists(&dir.path().join("manifest.toml"))
            .unwrap());
        assert!(catalog.is_empty());
    }
}
