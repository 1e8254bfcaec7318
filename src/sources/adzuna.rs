// src/sources/adzuna.rs
use super::{SourceAdapter, SourceQuery};
use crate::core::search_config::WorkType;
use crate::types::JobRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";

pub const SOURCE_NAME: &str = "adzuna";

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    id: Option<Value>,
    title: Option<String>,
    company: Option<AdzunaName>,
    location: Option<AdzunaName>,
    redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaName {
    display_name: Option<String>,
}

/// Adzuna job search API.
pub struct AdzunaSource {
    client: Client,
    base_url: String,
    app_id: String,
    app_key: String,
    country: String,
    results_per_page: u32,
}

impl AdzunaSource {
    pub fn new(app_id: String, app_key: String, country: String, results_per_page: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id,
            app_key,
            country,
            results_per_page,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn query_params(&self, query: &SourceQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("app_id", self.app_id.clone()),
            ("app_key", self.app_key.clone()),
            ("results_per_page", self.results_per_page.to_string()),
            ("what", query.keyword.clone()),
            ("where", query.location.clone()),
            ("distance", query.radius_km.to_string()),
            ("max_days_old", query.recency_days.to_string()),
        ];

        match query.work_type {
            WorkType::All => {}
            WorkType::Remote => params.push(("what_and", "remote".to_string())),
            WorkType::Hybrid => params.push(("what_and", "hybrid".to_string())),
            WorkType::Onsite => params.push(("what_exclude", "remote".to_string())),
        }

        params
    }

    fn parse_results(body: &str) -> Result<Vec<JobRecord>> {
        let response: AdzunaResponse =
            serde_json::from_str(body).context("Failed to parse Adzuna response")?;

        Ok(response
            .results
            .into_iter()
            .map(|job| {
                let id = job.id.and_then(|value| match value {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });

                JobRecord::new(
                    SOURCE_NAME,
                    id,
                    job.title.as_deref().unwrap_or("Ohne Titel"),
                    job.redirect_url.as_deref().unwrap_or_default(),
                )
                .with_company(job.company.and_then(|c| c.display_name))
                .with_location(job.location.and_then(|l| l.display_name))
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for AdzunaSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobRecord>> {
        let url = format!("{}/{}/search/1", self.base_url, self.country);
        debug!("Querying Adzuna for '{}' in {}", query.keyword, query.location);

        let response = self
            .client
            .get(&url)
            .query(&self.query_params(query))
            .send()
            .await
            .context("Failed to call Adzuna API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Adzuna response body")?;

        if !status.is_success() {
            anyhow::bail!("Adzuna returned error {}: {}", status, body);
        }

        let jobs = Self::parse_results(&body)?;
        info!("Adzuna returned {} jobs for '{}'", jobs.len(), query.keyword);
        Ok(jobs)
    }
}
