// src/core/search_config.rs
//! Search parameters edited by the user and read at the start of every cycle

use crate::core::FsOps;
use crate::utils::{normalize_keywords, parse_execution_time};
use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    #[default]
    All,
    Remote,
    Hybrid,
    Onsite,
}

impl FromStr for WorkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(WorkType::All),
            "remote" => Ok(WorkType::Remote),
            "hybrid" => Ok(WorkType::Hybrid),
            "onsite" => Ok(WorkType::Onsite),
            other => anyhow::bail!(
                "Unsupported work type: {}. Use all, remote, hybrid or onsite",
                other
            ),
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkType::All => "all",
            WorkType::Remote => "remote",
            WorkType::Hybrid => "hybrid",
            WorkType::Onsite => "onsite",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub location: String,
    /// Kilometers
    pub radius: u32,
    pub keywords: Vec<String>,
    pub work_type: WorkType,
    /// Daily run, 24-hour `HH:MM`
    pub execution_time: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            location: "Coburg".to_string(),
            radius: 100,
            keywords: vec!["system administrator".to_string()],
            work_type: WorkType::All,
            execution_time: "12:00".to_string(),
        }
    }
}

/// Partial change to a [`SearchConfig`]; `None` fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfigUpdate {
    pub location: Option<String>,
    pub radius: Option<u32>,
    pub keywords: Option<Vec<String>>,
    pub work_type: Option<WorkType>,
    pub execution_time: Option<String>,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            anyhow::bail!("Location must not be empty");
        }
        if self.radius == 0 {
            anyhow::bail!("Radius must be at least 1 km");
        }
        parse_execution_time(&self.execution_time)?;
        Ok(())
    }

    pub fn execution_time(&self) -> Result<NaiveTime> {
        parse_execution_time(&self.execution_time)
    }

    /// Apply an update, validating the result before it replaces `self`
    pub fn apply(&mut self, update: SearchConfigUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(location) = update.location {
            next.location = location.trim().to_string();
        }
        if let Some(radius) = update.radius {
            next.radius = radius;
        }
        if let Some(keywords) = update.keywords {
            next.keywords = normalize_keywords(keywords);
        }
        if let Some(work_type) = update.work_type {
            next.work_type = work_type;
        }
        if let Some(execution_time) = update.execution_time {
            next.execution_time = execution_time.trim().to_string();
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.keywords = normalize_keywords(&self.keywords);
        self
    }
}

/// `config.json` holding the current [`SearchConfig`].
#[derive(Debug, Clone)]
pub struct SearchConfigStore {
    path: PathBuf,
}

impl SearchConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration.
    ///
    /// A missing file is created with the defaults. A broken file falls back
    /// to the defaults without being overwritten, so the user can fix it.
    pub async fn load(&self) -> SearchConfig {
        let content = match FsOps::read_optional(&self.path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!(
                    "No search config at {}, creating defaults",
                    self.path.display()
                );
                let defaults = SearchConfig::default();
                if let Err(e) = self.save(&defaults).await {
                    error!("Failed to write default search config: {:#}", e);
                }
                return defaults;
            }
            Err(e) => {
                error!("Failed to read search config, using defaults: {:#}", e);
                return SearchConfig::default();
            }
        };

        match serde_json::from_str::<SearchConfig>(&content) {
            Ok(config) => {
                let config = config.normalized();
                if let Err(e) = config.validate() {
                    warn!("Search config has invalid values: {:#}", e);
                }
                config
            }
            Err(e) => {
                error!(
                    "Failed to parse search config at {}, using defaults: {}",
                    self.path.display(),
                    e
                );
                SearchConfig::default()
            }
        }
    }

    pub async fn save(&self, config: &SearchConfig) -> Result<()> {
        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize search config")?;
        FsOps::write_file_atomic(&self.path, &content).await?;
        info!("Search config saved to {}", self.path.display());
        Ok(())
    }

    pub async fn update(&self, update: SearchConfigUpdate) -> Result<SearchConfig> {
        let mut config = self.load().await;
        config.apply(update)?;
        self.save(&config).await?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_initialized_with_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SearchConfigStore::new(dir.path().join("config.json"));

        let config = store.load().await;
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.location, "Coburg");
        assert_eq!(config.radius, 100);
        assert_eq!(config.keywords, vec!["system administrator"]);
        assert_eq!(config.work_type, WorkType::All);
        assert_eq!(config.execution_time, "12:00");

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(written["work_type"], "all");
    }

    #[tokio::test]
    async fn test_partial_file_is_filled_from_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"location": "Bamberg", "keywords": ["admin", " admin ", "devops"]}"#,
        )
        .unwrap();

        let config = SearchConfigStore::new(path).load().await;
        assert_eq!(config.location, "Bamberg");
        assert_eq!(config.radius, 100);
        assert_eq!(config.keywords, vec!["admin", "devops"]);
    }

    #[tokio::test]
    async fn test_broken_file_falls_back_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = SearchConfigStore::new(path.clone()).load().await;
        assert_eq!(config, SearchConfig::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_update_persists_changes() {
        let dir = TempDir::new().unwrap();
        let store = SearchConfigStore::new(dir.path().join("config.json"));

        let updated = store
            .update(SearchConfigUpdate {
                radius: Some(25),
                work_type: Some(WorkType::Remote),
                keywords: Some(vec!["python".into(), "".into(), "devops".into()]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.radius, 25);
        assert_eq!(updated.keywords, vec!["python", "devops"]);
        assert_eq!(store.load().await, updated);
    }

    #[test]
    fn test_apply_rejects_invalid_values() {
        let mut config = SearchConfig::default();

        let result = config.apply(SearchConfigUpdate {
            radius: Some(50),
            execution_time: Some("24:61".into()),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_work_type_from_str() {
        assert_eq!("Remote".parse::<WorkType>().unwrap(), WorkType::Remote);
        assert_eq!(WorkType::Onsite.to_string(), "onsite");
        assert!("office".parse::<WorkType>().is_err());
    }
}
