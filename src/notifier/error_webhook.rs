// src/notifier/error_webhook.rs
use super::{truncate_chars, MAX_MESSAGE_CHARS};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};

/// Sends operational messages (errors, startup health) to an optional webhook.
///
/// Every method swallows its own failures after logging them.
pub struct ErrorReporter {
    client: Client,
    webhook_url: Option<String>,
}

impl ErrorReporter {
    pub fn new(webhook_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn report(&self, message: &str) {
        self.send(&error_content(message)).await;
    }

    /// Announce a started bot with version, host and platform
    pub async fn send_healthcheck(&self, version: &str) {
        let content = format!(
            "✅ **JobBot gestartet**\n**Version:** {}\n**Host:** {}\n**System:** {} {}\n**Zeitpunkt:** {}",
            version,
            hostname(),
            std::env::consts::OS,
            std::env::consts::ARCH,
            chrono::Local::now().to_rfc3339()
        );
        self.send(&content).await;
        info!("Health check sent");
    }

    async fn send(&self, content: &str) {
        let Some(url) = &self.webhook_url else {
            debug!("No error webhook configured, dropping message");
            return;
        };

        let result = self
            .client
            .post(url)
            .json(&json!({ "content": content }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        if let Err(e) = result {
            error!("Failed to send message to webhook: {}", e);
        }
    }
}

fn error_content(message: &str) -> String {
    // Leave room for the wrapper around the message
    let body = truncate_chars(message, MAX_MESSAGE_CHARS - 32);
    format!("🚨 Bot Error:\n```{}```", body)
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_content_is_wrapped_and_bounded() {
        assert_eq!(error_content("boom"), "🚨 Bot Error:\n```boom```");

        let long = "e".repeat(5000);
        assert!(error_content(&long).chars().count() <= MAX_MESSAGE_CHARS);
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_silent() {
        let reporter = ErrorReporter::new(None).unwrap();
        assert!(!reporter.is_enabled());
        reporter.report("nothing happens").await;
    }
}
