//! Local directory creation for downloads.
//!
//! Several workers may create directories under the same ancestor at once, so
//! every function here treats an existing directory as success.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Ensure `dir` and all of its ancestors exist as directories.
///
/// Fails with [`Error::LocalIo`] when a non-directory occupies any of the
/// paths.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        // A concurrent creator may win between the existence check and mkdir.
        Err(e) if e.kind() == ErrorKind::AlreadyExists && is_dir(dir).await => Ok(()),
        Err(e) => Err(Error::local_io(dir, e)),
    }
}

/// Ensure the parent directory of the file at `path` exists.
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).await,
        _ => Ok(()),
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_nested_parents() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a").join("b").join("c.txt");

        ensure_parent_dir(&file).await.unwrap();
        assert!(temp.path().join("a").join("b").is_dir());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_existing_directory_is_success() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("x");

        ensure_dir(&dir).await.unwrap();
        ensure_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_calls_sharing_ancestors() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let file = root.join("shared").join("deep").join(format!("f{}", i % 4)).join("x.bin");
                tokio::spawn(async move { ensure_parent_dir(&file).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        for i in 0..4 {
            assert!(root.join("shared").join("deep").join(format!("f{i}")).is_dir());
        }
    }

    #[tokio::test]
    async fn test_file_in_the_way_is_local_io_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocker"), b"x").unwrap();

        let result = ensure_parent_dir(&temp.path().join("blocker").join("a.txt")).await;
        assert!(matches!(result, Err(Error::LocalIo(_))));
    }

    #[tokio::test]
    async fn test_bare_file_name_needs_no_directory() {
        ensure_parent_dir(Path::new("a.txt")).await.unwrap();
    }
}
