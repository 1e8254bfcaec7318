// src/runner.rs
use crate::core::SearchConfigStore;
use crate::database::NotifiedJobRepository;
use crate::discovery::DiscoveryEngine;
use crate::notifier::{ErrorReporter, Notifier};
use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pause between two chat messages
const NOTIFY_PACING: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchSummary {
    pub found: usize,
    pub notified: usize,
    pub failed_notifications: usize,
    pub failed_calls: usize,
    pub duration_ms: u128,
}

/// Runs a discovery cycle and hands every novel job to the notifier.
pub struct SearchRunner {
    engine: Arc<DiscoveryEngine>,
    config_store: SearchConfigStore,
    notifier: Arc<dyn Notifier>,
    reporter: Arc<ErrorReporter>,
    database: Option<SqlitePool>,
    pacing: Duration,
}

impl SearchRunner {
    pub fn new(
        engine: Arc<DiscoveryEngine>,
        config_store: SearchConfigStore,
        notifier: Arc<dyn Notifier>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            engine,
            config_store,
            notifier,
            reporter,
            database: None,
            pacing: NOTIFY_PACING,
        }
    }

    /// Record every posted job so button presses can be resolved later
    pub fn with_database(mut self, pool: SqlitePool) -> Self {
        self.database = Some(pool);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn config_store(&self) -> &SearchConfigStore {
        &self.config_store
    }

    /// Search jobs posted within the last `recency_days` days
    pub async fn run_search(&self, recency_days: u32) -> Result<SearchSummary> {
        let config = self.config_store.load().await;

        let report = match self.engine.run_cycle(&config, recency_days).await {
            Ok(report) => report,
            Err(e) => {
                error!("Discovery cycle failed: {:#}", e);
                self.reporter
                    .report(&format!("Discovery cycle failed: {:#}", e))
                    .await;
                return Err(e);
            }
        };

        let mut notified = 0;
        let mut failed_notifications = 0;

        for (index, job) in report.novel.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            if let Some(pool) = &self.database {
                if let Err(e) = NotifiedJobRepository::new(pool).record(job).await {
                    warn!("Buttons for '{}' will not resolve: {:#}", job.title, e);
                }
            }

            match self.notifier.notify(job, &config.keywords).await {
                Ok(()) => notified += 1,
                Err(e) => {
                    failed_notifications += 1;
                    error!("Failed to notify job {} ({}): {:#}", job.title, job.source, e);
                    self.reporter
                        .report(&format!("Notification failed for '{}': {:#}", job.title, e))
                        .await;
                }
            }
        }

        info!(
            "Search finished: {} new jobs, {} notified, {} notification failures",
            report.novel.len(),
            notified,
            failed_notifications
        );

        Ok(SearchSummary {
            found: report.novel.len(),
            notified,
            failed_notifications,
            failed_calls: report.failed_calls,
            duration_ms: report.duration.as_millis(),
        })
    }
}
