use async_std::fs::File;
use bundlecrab_core::InstallError;
use futures::AsyncReadExt;
use sha2::{Digest, Sha256};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

pub fn to_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of a file on disk, as lowercase hex.
pub async fn file_sha256(path: &Path) -> Result<String, InstallError> {
    let mut file = File::open(path)
        .await
        .map_err(|e| InstallError::io("open file for hashing", path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| InstallError::io("hash read", path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(to_hex(&hasher.finalize()))
}

pub fn same_digest(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn test_file_sha256_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        let digest = file_sha256(&path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(same_digest(&digest.to_uppercase(), &digest));
    }
}
