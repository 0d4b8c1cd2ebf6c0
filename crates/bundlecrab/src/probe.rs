use crate::store::AssetStore;
use bundlecrab_core::manifest::part_path;
use bundlecrab_core::InstallError;

/// The numbered parts a logical path is split into, in index order.
///
/// Empty means the artifact is stored as a single blob under its base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSequence {
    base: String,
    parts: Vec<String>,
}

impl PartSequence {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn is_single_file(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(String::as_str)
    }
}

/// Probes `{base}.part1`, `{base}.part2`, ... until the first index that is
/// missing. A missing `.part1` is not an error, it selects single-file mode.
pub async fn detect_parts(store: &dyn AssetStore, base: &str) -> Result<PartSequence, InstallError> {
    let mut parts = Vec::new();
    let mut index = 1;

    loop {
        let candidate = part_path(base, index);
        if !store.contains(&candidate).await? {
            break;
        }
        log::trace!("Found part {}", candidate);
        parts.push(candidate);
        index += 1;
    }

    if parts.is_empty() {
        log::debug!("No parts for {}, using single-file mode", base);
    } else {
        log::debug!("{} is split into {} parts", base, parts.len());
    }

    Ok(PartSequence {
        base: base.to_string(),
        parts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAssetStore;

    #[async_std::test]
    async fn test_probe_stops_at_first_gap() {
        let store = MemoryAssetStore::new();
        store.insert("models/model.bin.part1", vec![1]);
        store.insert("models/model.bin.part2", vec![2]);
        store.insert("models/model.bin.part3", vec![3]);
        // part4 missing, part5 must never be considered
        store.insert("models/model.bin.part5", vec![5]);

        let seq = detect_parts(&store, "models/model.bin").await.unwrap();
        assert_eq!(
            seq.parts(),
            &[
                "models/model.bin.part1".to_string(),
                "models/model.bin.part2".to_string(),
                "models/model.bin.part3".to_string(),
            ]
        );
        assert_eq!(store.probes(), 4);
        assert_eq!(store.reads(), 0, "probing must not load part bytes");
    }

    #[async_std::test]
    async fn test_probe_without_part1_is_single_file() {
        let store = MemoryAssetStore::new();
        store.insert("models/model.bin", vec![0; 16]);
        store.insert("models/model.bin.part2", vec![2]);

        let seq = detect_parts(&store, "models/model.bin").await.unwrap();
        assert!(seq.is_single_file());
        assert_eq!(seq.base(), "models/model.bin");
    }

    #[async_std::test]
    async fn test_part_indices_are_not_zero_padded() {
        let store = MemoryAssetStore::new();
        for i in 1..=10 {
            store.insert(format!("w.bin.part{}", i), vec![i as u8]);
        }
        store.insert("w.bin.part01", vec![0]);

        let seq = detect_parts(&store, "w.bin").await.unwrap();
        assert_eq!(seq.len(), 10);
        assert_eq!(seq.iter().last(), Some("w.bin.part10"));
    }
}
