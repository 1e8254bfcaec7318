// src/seen_store.rs
//! Persisted set of jobs that were already notified.

use crate::core::FsOps;
use crate::types::SeenKey;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
#[cfg(test)]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// In-memory view of the seen-set for one discovery cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    ids: HashSet<SeenKey>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &SeenKey) -> bool {
        self.ids.contains(key)
    }

    /// Returns `false` if the key was already present
    pub fn add(&mut self, key: SeenKey) -> bool {
        self.ids.insert(key)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in a stable order for serialization
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(SeenKey::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<SeenKey> for SeenSet {
    fn from_iter<I: IntoIterator<Item = SeenKey>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
struct SeenFileOut<'a> {
    posted_ids: Vec<&'a str>,
}

// Older files were either wrapped in `posted_ids` or a bare list, and some
// sources wrote numeric ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum SeenFileIn {
    Wrapped { posted_ids: Vec<Value> },
    Bare(Vec<Value>),
}

/// Exclusive hold on a seen-set file, shared with every process using the
/// same path. Released on drop.
#[derive(Debug)]
pub struct SeenLock {
    _file: File,
}

/// JSON file backing the seen-set.
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
    #[cfg(test)]
    failing_persists: Arc<AtomicUsize>,
}

impl SeenStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            #[cfg(test)]
            failing_persists: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.lock`, next to the seen-set file
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Wait for exclusive use of the seen-set, across processes.
    pub async fn lock(&self) -> Result<SeenLock> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                FsOps::ensure_dir_exists(parent).await?;
            }
        }

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
            file.lock_exclusive()
                .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
            Ok(file)
        })
        .await
        .context("Seen-set lock task failed")??;

        debug!("Seen-set lock acquired: {}", self.path.display());
        Ok(SeenLock { _file: file })
    }

    #[cfg(test)]
    pub(crate) fn fail_next_persists(&self, count: usize) {
        self.failing_persists.store(count, Ordering::SeqCst);
    }

    /// Load the persisted set.
    ///
    /// A missing file is an empty set. An unreadable or corrupt file is also
    /// treated as empty, with a warning.
    pub async fn load(&self) -> SeenSet {
        let content = match FsOps::read_optional(&self.path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                info!(
                    "No seen-set at {}, starting with an empty set",
                    self.path.display()
                );
                return SeenSet::new();
            }
            Err(e) => {
                warn!("Seen-set unreadable, treating as empty: {:#}", e);
                return SeenSet::new();
            }
        };

        match Self::parse(&content) {
            Ok(seen) => {
                info!(
                    "Loaded {} seen job ids from {}",
                    seen.len(),
                    self.path.display()
                );
                seen
            }
            Err(e) => {
                warn!(
                    "Seen-set at {} is corrupt, treating as empty: {:#}",
                    self.path.display(),
                    e
                );
                SeenSet::new()
            }
        }
    }

    /// Write the full set, replacing whatever was stored before.
    pub async fn persist(&self, seen: &SeenSet) -> Result<()> {
        #[cfg(test)]
        if self
            .failing_persists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("Simulated write failure for {}", self.path.display());
        }

        let content = serde_json::to_string_pretty(&SeenFileOut {
            posted_ids: seen.sorted_ids(),
        })
        .context("Failed to serialize seen-set")?;

        FsOps::write_file_atomic(&self.path, &content)
            .await
            .with_context(|| format!("Failed to persist seen-set to {}", self.path.display()))?;

        info!("Persisted {} seen job ids", seen.len());
        Ok(())
    }

    fn parse(content: &str) -> Result<SeenSet> {
        let stored: SeenFileIn =
            serde_json::from_str(content).context("Failed to parse seen-set JSON")?;

        let values = match stored {
            SeenFileIn::Wrapped { posted_ids } => posted_ids,
            SeenFileIn::Bare(ids) => ids,
        };

        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(SeenKey::from_stored(s)),
                Value::Number(n) => Some(SeenKey::from_stored(n.to_string())),
                _ => None,
            })
            .collect())
    }
}
