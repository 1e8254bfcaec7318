// src/core/fs_ops.rs
//! File system helpers shared by the JSON stores

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::io::Write;
use tokio::fs;
use tracing::{debug, info};

pub struct FsOps;

impl FsOps {
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            info!("Created directory: {}", path.display());
        }
        Ok(())
    }

    pub async fn read_file_safe(path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Read a file, `Ok(None)` if it does not exist
    pub async fn read_optional(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read file: {}", path.display()))
            }
        }
    }

    /// Replace `path` with `content` so readers only ever see the old or the new file.
    ///
    /// Content goes to a uniquely named temp file next to the target, is
    /// flushed to disk, then renamed over the target. Concurrent writers never
    /// share a temp file.
    pub async fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir_exists(&dir).await?;

        let target = path.to_path_buf();
        let content = content.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || Self::replace_file(&dir, &target, &content))
            .await
            .context("Atomic write task failed")??;

        debug!("Written file: {}", path.display());
        Ok(())
    }

    fn replace_file(dir: &Path, target: &Path, content: &[u8]) -> Result<()> {
        let file_name = target
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("state");

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(content)
            .with_context(|| format!("Failed to write temp file for {}", target.display()))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync temp file for {}", target.display()))?;

        tmp.persist(target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move temp file over {}", target.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_file_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        FsOps::write_file_atomic(&path, "first").await.unwrap();
        FsOps::write_file_atomic(&path, "second").await.unwrap();

        assert_eq!(FsOps::read_file_safe(&path).await.unwrap(), "second");
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_a_complete_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let first = "a".repeat(64 * 1024);
        let second = "b".repeat(64 * 1024);

        let (a, b) = tokio::join!(
            FsOps::write_file_atomic(&path, &first),
            FsOps::write_file_atomic(&path, &second)
        );
        a.unwrap();
        b.unwrap();

        let content = FsOps::read_file_safe(&path).await.unwrap();
        assert!(content == first || content == second);
    }

    #[tokio::test]
    async fn test_read_optional_missing_file() {
        let dir = TempDir::new().unwrap();
        let content = FsOps::read_optional(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(content.is_none());
    }
}
