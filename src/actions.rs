// src/actions.rs
//! Dispatch of the Save / Skip / Remove / Apply actions attached to job messages

use crate::application::ApplicationService;
use crate::database::{FavoriteRepository, NotifiedJobRepository};
use crate::types::{JobAction, JobRecord};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct ActionDispatcher {
    pool: SqlitePool,
    applications: Option<Arc<ApplicationService>>,
}

impl ActionDispatcher {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            applications: None,
        }
    }

    pub fn with_applications(mut self, applications: Arc<ApplicationService>) -> Self {
        self.applications = Some(applications);
        self
    }

    /// Run one action. Failures become an unsuccessful outcome, never an error.
    pub async fn dispatch(&self, action: JobAction) -> ActionOutcome {
        info!("Dispatching {} for {}", action.name(), action.job().title);

        match action {
            JobAction::Save(job) => self.save(&job).await,
            JobAction::Skip(job) => {
                info!("Skipped job: {} ({})", job.title, job.source);
                ActionOutcome::ok("⏭️ Skipped")
            }
            JobAction::Remove(job) => self.remove(&job).await,
            JobAction::Apply(job) => self.apply(&job).await,
        }
    }

    /// Run the action behind a chat button id (`<action>|<source>:<id>`)
    pub async fn dispatch_custom_id(&self, custom_id: &str) -> ActionOutcome {
        let Some((name, source, job_id)) = parse_custom_id(custom_id) else {
            warn!("Unrecognised button id: {}", custom_id);
            return ActionOutcome::failed("Unknown button");
        };

        let job = match self.lookup(source, job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return ActionOutcome::failed("Job is no longer known"),
            Err(e) => {
                error!("Failed to look up job {}:{}: {:#}", source, job_id, e);
                return ActionOutcome::failed(format!("Could not look up job: {}", e));
            }
        };

        match JobAction::from_name(name, job) {
            Some(action) => self.dispatch(action).await,
            None => ActionOutcome::failed(format!("Unknown action: {}", name)),
        }
    }

    /// A posted job, or a saved one posted before jobs were recorded
    async fn lookup(&self, source: &str, job_id: &str) -> anyhow::Result<Option<JobRecord>> {
        if let Some(job) = NotifiedJobRepository::new(&self.pool).find(source, job_id).await? {
            return Ok(Some(job));
        }
        let favorite = FavoriteRepository::new(&self.pool).find(source, job_id).await?;
        Ok(favorite.map(|f| f.job))
    }

    async fn save(&self, job: &JobRecord) -> ActionOutcome {
        match FavoriteRepository::new(&self.pool).save(job).await {
            Ok(true) => ActionOutcome::ok("💾 Saved"),
            Ok(false) => ActionOutcome::ok("💾 Already saved"),
            Err(e) => {
                error!("Failed to save job: {:#}", e);
                ActionOutcome::failed(format!("Could not save job: {}", e))
            }
        }
    }

    async fn remove(&self, job: &JobRecord) -> ActionOutcome {
        let Some(id) = job.id.as_deref() else {
            return ActionOutcome::failed("Job has no id");
        };

        match FavoriteRepository::new(&self.pool).remove(&job.source, id).await {
            Ok(true) => ActionOutcome::ok("🗑️ Removed"),
            Ok(false) => ActionOutcome::failed("Job is not saved"),
            Err(e) => {
                error!("Failed to remove job: {:#}", e);
                ActionOutcome::failed(format!("Could not remove job: {}", e))
            }
        }
    }

    async fn apply(&self, job: &JobRecord) -> ActionOutcome {
        let Some(id) = job.id.as_deref() else {
            return ActionOutcome::failed("Job has no id");
        };

        let favorite = match FavoriteRepository::new(&self.pool).find(&job.source, id).await {
            Ok(Some(favorite)) => favorite,
            Ok(None) => return ActionOutcome::failed("Save the job before applying"),
            Err(e) => {
                error!("Failed to look up saved job: {:#}", e);
                return ActionOutcome::failed(format!("Could not look up job: {}", e));
            }
        };

        let Some(email) = favorite.email.as_deref() else {
            return ActionOutcome::failed("No contact email set for this job");
        };

        let Some(applications) = &self.applications else {
            warn!("Apply requested but applications are not configured");
            return ActionOutcome::failed("Applications are not configured");
        };

        match applications.apply(&favorite.job, email).await {
            Ok(()) => ActionOutcome::ok(format!("📨 Application sent to {}", email)),
            Err(e) => {
                error!("Failed to send application for {}: {:#}", favorite.job.title, e);
                ActionOutcome::failed(format!("Could not send application: {}", e))
            }
        }
    }
}

/// Split a button id into `(action, source, id)`.
///
/// The source ends at the first `:`, ids may contain more.
pub fn parse_custom_id(custom_id: &str) -> Option<(&str, &str, &str)> {
    let (action, key) = custom_id.split_once('|')?;
    let (source, job_id) = key.split_once(':')?;
    if action.is_empty() || source.is_empty() || job_id.is_empty() {
        return None;
    }
    Some((action, source, job_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::CoverLetter;
    use crate::database::tests::test_database;
    use crate::notifier::discord::custom_id;
    use tempfile::TempDir;

    fn job(id: &str) -> JobRecord {
        JobRecord::new("adzuna", Some(id.to_string()), "Linux Admin", "https://x")
    }

    #[tokio::test]
    async fn test_save_then_save_again() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let dispatcher = ActionDispatcher::new(db.pool().unwrap().clone());

        let first = dispatcher.dispatch(JobAction::Save(job("1"))).await;
        let second = dispatcher.dispatch(JobAction::Save(job("1"))).await;

        assert!(first.success);
        assert!(second.success);
        assert_eq!(second.message, "💾 Already saved");

        let saved = FavoriteRepository::new(db.pool().unwrap()).list().await.unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn test_skip_does_not_store() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let dispatcher = ActionDispatcher::new(db.pool().unwrap().clone());

        assert!(dispatcher.dispatch(JobAction::Skip(job("1"))).await.success);
        let saved = FavoriteRepository::new(db.pool().unwrap()).list().await.unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let dispatcher = ActionDispatcher::new(db.pool().unwrap().clone());

        assert!(!dispatcher.dispatch(JobAction::Remove(job("1"))).await.success);
        dispatcher.dispatch(JobAction::Save(job("1"))).await;
        assert!(dispatcher.dispatch(JobAction::Remove(job("1"))).await.success);
    }

    #[tokio::test]
    async fn test_apply_preconditions() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let applications = Arc::new(ApplicationService::new(
            CoverLetter::new(
                dir.path().join("vorlage.txt"),
                dir.path().join("out"),
                "Erika".to_string(),
            ),
            vec![],
            "Erika".to_string(),
            None,
        ));
        let dispatcher =
            ActionDispatcher::new(db.pool().unwrap().clone()).with_applications(applications);

        let outcome = dispatcher.dispatch(JobAction::Apply(job("1"))).await;
        assert_eq!(outcome.message, "Save the job before applying");

        dispatcher.dispatch(JobAction::Save(job("1"))).await;
        let outcome = dispatcher.dispatch(JobAction::Apply(job("1"))).await;
        assert_eq!(outcome.message, "No contact email set for this job");

        FavoriteRepository::new(db.pool().unwrap())
            .set_email("adzuna", "1", "hr@acme.de")
            .await
            .unwrap();
        let outcome = dispatcher.dispatch(JobAction::Apply(job("1"))).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Could not send application"));
    }

    #[tokio::test]
    async fn test_apply_without_id() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let dispatcher = ActionDispatcher::new(db.pool().unwrap().clone());

        let no_id = JobRecord::new("adzuna", None, "Admin", "https://x");
        assert!(!dispatcher.dispatch(JobAction::Apply(no_id)).await.success);
    }

    #[test]
    fn test_parse_custom_id() {
        assert_eq!(
            parse_custom_id("save|arbeitsagentur:https://x/y?id=1"),
            Some(("save", "arbeitsagentur", "https://x/y?id=1"))
        );
        assert_eq!(parse_custom_id("save|nokey"), None);
        assert_eq!(parse_custom_id("|adzuna:1"), None);
        assert_eq!(parse_custom_id("garbage"), None);
    }

    #[tokio::test]
    async fn test_button_press_saves_notified_job() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let pool = db.pool().unwrap();
        let dispatcher = ActionDispatcher::new(pool.clone());

        let posted = job("42").with_company(Some("ACME".to_string()));
        NotifiedJobRepository::new(pool).record(&posted).await.unwrap();

        let key = posted.seen_key().unwrap().to_string();
        let outcome = dispatcher.dispatch_custom_id(&custom_id("save", &key)).await;
        assert!(outcome.success);

        let saved = FavoriteRepository::new(pool).find("adzuna", "42").await.unwrap().unwrap();
        assert_eq!(saved.job, posted);

        let skipped = dispatcher.dispatch_custom_id(&custom_id("skip", &key)).await;
        assert!(skipped.success);
    }

    #[tokio::test]
    async fn test_button_press_for_unknown_job() {
        let dir = TempDir::new().unwrap();
        let db = test_database(&dir).await;
        let dispatcher = ActionDispatcher::new(db.pool().unwrap().clone());

        let outcome = dispatcher.dispatch_custom_id("save|adzuna:404").await;
        assert_eq!(outcome.message, "Job is no longer known");

        let outcome = dispatcher.dispatch_custom_id("not-a-button").await;
        assert!(!outcome.success);
    }
}
