// src/sources/arbeitsagentur.rs
use super::{SourceAdapter, SourceQuery};
use crate::types::JobRecord;
use crate::utils::clean_text;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

const BASE_URL: &str = "https://jobboerse.arbeitsagentur.de";
const SEARCH_PATH: &str = "/vamJB/start";
const LISTING_SELECTOR: &str = "a.stellenangebot";
const MAX_LISTINGS: usize = 3;

pub const SOURCE_NAME: &str = "arbeitsagentur";

/// Scrapes the public job board of the Bundesagentur für Arbeit.
pub struct ArbeitsagenturSource {
    client: Client,
    base_url: String,
}

impl ArbeitsagenturSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Extract listings from a result page, keeping page order
    fn parse_listings(&self, html: &str, location: &str) -> Result<Vec<JobRecord>> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(LISTING_SELECTOR)
            .map_err(|e| anyhow::anyhow!("Invalid selector {}: {}", LISTING_SELECTOR, e))?;
        let base = Url::parse(&self.base_url).context("Invalid Arbeitsagentur base URL")?;

        let mut jobs = Vec::new();
        for element in document.select(&selector).take(MAX_LISTINGS) {
            let title = clean_text(&element.text().collect::<Vec<_>>().join(" "));
            let Some(href) = element.value().attr("href") else {
                warn!("Skipping listing without link: {}", title);
                continue;
            };

            let url = match base.join(href) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping listing with invalid link {}: {}", href, e);
                    continue;
                }
            };

            jobs.push(
                JobRecord::new(SOURCE_NAME, Self::listing_id(&url), &title, url.as_str())
                    .with_company(Some("Arbeitsagentur".to_string()))
                    .with_location(Some(location.to_string())),
            );
        }

        Ok(jobs)
    }

    /// Reference number of a listing.
    ///
    /// The `refnr` parameter if present, else a last path segment that looks
    /// like a reference (has a digit, no file extension), else the whole link
    /// without its fragment. Page names like `stellenangebotAnzeigen.html`
    /// are shared by many listings and never used as ids.
    fn listing_id(url: &Url) -> Option<String> {
        if let Some((_, refnr)) = url.query_pairs().find(|(key, _)| key == "refnr") {
            if !refnr.trim().is_empty() {
                return Some(refnr.trim().to_string());
            }
        }

        let reference = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .filter(|segment| {
                segment.chars().any(|c| c.is_ascii_digit()) && !segment.contains('.')
            });
        if let Some(reference) = reference {
            return Some(reference.to_string());
        }

        let mut canonical = url.clone();
        canonical.set_fragment(None);
        Some(canonical.to_string())
    }
}

#[async_trait]
impl SourceAdapter for ArbeitsagenturSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobRecord>> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        debug!(
            "Scraping Arbeitsagentur for '{}' in {} (radius and recency are not supported)",
            query.keyword, query.location
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("aa", "1"),
                ("ref", "home"),
                ("stellenart", "1"),
                ("was", query.keyword.as_str()),
                ("wo", query.location.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch Arbeitsagentur search page")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let html = response
            .text()
            .await
            .context("Failed to read response body")?;

        let jobs = self.parse_listings(&html, &query.location)?;
        info!(
            "Arbeitsagentur returned {} jobs for '{}'",
            jobs.len(),
            query.keyword
        );
        Ok(jobs)
    }
}
