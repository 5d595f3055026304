//! Partial-result salvage.

use std::path::Path;

/// Whether the artifact at `path` can be delivered: it exists and is non-empty.
pub async fn is_usable(path: &Path) -> bool {
    artifact_size(path).await.is_some_and(|size| size > 0)
}

/// Size of the artifact in bytes, if it is a regular file.
pub async fn artifact_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Some(metadata.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_artifact_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_usable(&dir.path().join("missing.mp4")).await);
    }

    #[tokio::test]
    async fn test_empty_artifact_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        tokio::fs::write(&path, b"").await.unwrap();
        assert!(!is_usable(&path).await);
        assert_eq!(artifact_size(&path).await, Some(0));
    }

    #[tokio::test]
    async fn test_partial_artifact_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        tokio::fs::write(&path, b"ftyp").await.unwrap();
        assert!(is_usable(&path).await);
    }

    #[tokio::test]
    async fn test_directory_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_usable(dir.path()).await);
    }
}
