// src/database.rs
use crate::types::{FavoriteJob, JobRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, sqlx::FromRow)]
struct FavoriteRow {
    source: String,
    job_id: String,
    title: String,
    company: Option<String>,
    location: Option<String>,
    url: String,
    email: Option<String>,
    saved_at: DateTime<Utc>,
}

impl From<FavoriteRow> for FavoriteJob {
    fn from(row: FavoriteRow) -> Self {
        FavoriteJob {
            job: JobRecord::new(&row.source, Some(row.job_id), &row.title, &row.url)
                .with_company(row.company)
                .with_location(row.location),
            email: row.email,
            saved_at: row.saved_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct NotifiedRow {
    source: String,
    job_id: String,
    title: String,
    company: Option<String>,
    location: Option<String>,
    url: String,
}

impl From<NotifiedRow> for JobRecord {
    fn from(row: NotifiedRow) -> Self {
        JobRecord::new(&row.source, Some(row.job_id), &row.title, &row.url)
            .with_company(row.company)
            .with_location(row.location)
    }
}

#[derive(Debug)]
pub struct DatabaseConfig {
    pub database_path: PathBuf,
    pub pool: Option<SqlitePool>,
}

impl DatabaseConfig {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database_path,
            pool: None,
        }
    }

    /// Initialize the database connection pool
    pub async fn init_pool(&mut self) -> Result<()> {
        if let Some(parent) = self.database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", self.database_path.display());
        let pool = SqlitePool::connect(&database_url)
            .await
            .context("Failed to connect to SQLite database")?;
        self.pool = Some(pool);

        info!("Database connection pool initialized: {}", database_url);
        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or_else(|| {
            anyhow::anyhow!("Database pool not initialized. Call init_pool() first.")
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.pool()?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                source TEXT NOT NULL,
                job_id TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT,
                location TEXT,
                url TEXT NOT NULL,
                email TEXT,
                saved_at TEXT NOT NULL,
                PRIMARY KEY (source, job_id)
            );
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create favorites table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notified_jobs (
                source TEXT NOT NULL,
                job_id TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT,
                location TEXT,
                url TEXT NOT NULL,
                notified_at TEXT NOT NULL,
                PRIMARY KEY (source, job_id)
            );
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create notified_jobs table")?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

/// Saved jobs, keyed like the seen-set by `(source, id)`.
pub struct FavoriteRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FavoriteRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a job; `Ok(false)` when it was already saved
    pub async fn save(&self, job: &JobRecord) -> Result<bool> {
        let job_id = job
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Cannot save job without id: {}", job.title))?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO favorites
                (source, job_id, title, company, location, url, email, saved_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(&job.source)
        .bind(job_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.url)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            info!("Saved job: {} ({}:{})", job.title, job.source, job_id);
        }
        Ok(inserted)
    }

    pub async fn list(&self) -> Result<Vec<FavoriteJob>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT source, job_id, title, company, location, url, email, saved_at
            FROM favorites
            ORDER BY saved_at ASC, source ASC, job_id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FavoriteJob::from).collect())
    }

    pub async fn find(&self, source: &str, job_id: &str) -> Result<Option<FavoriteJob>> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT source, job_id, title, company, location, url, email, saved_at
            FROM favorites
            WHERE source = ? AND job_id = ?
            "#,
        )
        .bind(source)
        .bind(job_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(FavoriteJob::from))
    }

    pub async fn remove(&self, source: &str, job_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE source = ? AND job_id = ?")
            .bind(source)
            .bind(job_id)
            .execute(self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Removed saved job {}:{}", source, job_id);
        }
        Ok(removed)
    }

    /// Attach the contact address used when applying
    pub async fn set_email(&self, source: &str, job_id: &str, email: &str) -> Result<bool> {
        let email = email.trim();
        if !email.contains('@') {
            anyhow::bail!("Invalid email address: {}", email);
        }

        let result = sqlx::query("UPDATE favorites SET email = ? WHERE source = ? AND job_id = ?")
            .bind(email)
            .bind(source)
            .bind(job_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM favorites")
            .execute(self.pool)
            .await?;

        info!("Cleared {} saved jobs", result.rows_affected());
        Ok(result.rows_affected())
    }
}

/// Jobs that were posted to the channel, so a button press can be resolved
/// back to the full record.
pub struct NotifiedJobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NotifiedJobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, job: &JobRecord) -> Result<()> {
        let key = job
            .seen_key()
            .ok_or_else(|| anyhow::anyhow!("Cannot record job without id: {}", job.title))?;
        let (source, job_id) = key
            .parts()
            .ok_or_else(|| anyhow::anyhow!("Malformed job key: {}", key))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO notified_jobs
                (source, job_id, title, company, location, url, notified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source)
        .bind(job_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.url)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(&self, source: &str, job_id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, NotifiedRow>(
            r#"
            SELECT source, job_id, title, company, location, url
            FROM notified_jobs
            WHERE source = ? AND job_id = ?
            "#,
        )
        .bind(source)
        .bind(job_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(JobRecord::from))
    }
}
