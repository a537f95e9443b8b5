use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use sha2::{Sha256, Digest};
use thiserror::Error;

/// Block size used when streaming a file through the hasher.
const HASH_BLOCK: usize = 1024 * 8;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compute the SHA-256 digest of a file, reading it block by block.
pub async fn sha256_sum(path: &Path) -> Result<String, IntegrityError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check that the file on disk is exactly `expected` bytes long.
pub async fn verify_size(path: &Path, expected: u64) -> Result<bool, IntegrityError> {
    let actual = tokio::fs::metadata(path).await?.len();
    Ok(actual == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn digest_matches_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let sum = sha256_sum(&path).await.unwrap();
        assert_eq!(
            sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn digest_spans_multiple_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut data = vec![7u8; HASH_BLOCK * 3 + 5];
        tokio::fs::write(&a, &data).await.unwrap();
        *data.last_mut().unwrap() = 8;
        tokio::fs::write(&b, &data).await.unwrap();

        assert_ne!(sha256_sum(&a).await.unwrap(), sha256_sum(&b).await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(sha256_sum(&missing).await, Err(IntegrityError::Io(_))));
        assert!(verify_size(&missing, 0).await.is_err());
    }

    #[tokio::test]
    async fn size_check_compares_exact_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        tokio::fs::write(&path, vec![0u8; 10]).await.unwrap();

        assert!(verify_size(&path, 10).await.unwrap());
        assert!(!verify_size(&path, 11).await.unwrap());
    }
}
