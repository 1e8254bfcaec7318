// src/notifier/discord.rs
use super::{render_job_message, truncate_chars, Notifier};
use crate::types::JobRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const MAX_CUSTOM_ID_CHARS: usize = 100;

const COMPONENT_ACTION_ROW: u8 = 1;
const COMPONENT_BUTTON: u8 = 2;
const BUTTON_SECONDARY: u8 = 2;
const BUTTON_SUCCESS: u8 = 3;

#[derive(Debug, Serialize)]
struct CreateMessage {
    content: String,
    components: Vec<ActionRow>,
}

#[derive(Debug, Serialize)]
struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    components: Vec<Button>,
}

#[derive(Debug, Serialize)]
struct Button {
    #[serde(rename = "type")]
    kind: u8,
    style: u8,
    label: &'static str,
    custom_id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// Posts job messages with Save/Skip buttons to a Discord channel through the REST API.
pub struct DiscordNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
}

impl DiscordNotifier {
    pub fn new(bot_token: String, channel_id: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token,
            channel_id,
        })
    }

    fn build_message(job: &JobRecord, keywords: &[String]) -> CreateMessage {
        let key = job
            .seen_key()
            .map(|k| k.to_string())
            .unwrap_or_default();

        CreateMessage {
            content: render_job_message(job, keywords),
            components: vec![ActionRow {
                kind: COMPONENT_ACTION_ROW,
                components: vec![
                    Button {
                        kind: COMPONENT_BUTTON,
                        style: BUTTON_SUCCESS,
                        label: "💾 Save",
                        custom_id: custom_id("save", &key),
                    },
                    Button {
                        kind: COMPONENT_BUTTON,
                        style: BUTTON_SECONDARY,
                        label: "⏭️ Skip",
                        custom_id: custom_id("skip", &key),
                    },
                ],
            }],
        }
    }

    async fn post(&self, message: &CreateMessage) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}/channels/{}/messages", self.api_base, self.channel_id))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(message)
            .send()
            .await
            .context("Failed to send message to Discord")
    }
}

/// Button id in the form `<action>|<source>:<id>`, cut to Discord's limit
pub fn custom_id(action: &str, key: &str) -> String {
    truncate_chars(&format!("{}|{}", action, key), MAX_CUSTOM_ID_CHARS)
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, job: &JobRecord, keywords: &[String]) -> Result<()> {
        let message = Self::build_message(job, keywords);
        let mut response = self.post(&message).await?;

        // One retry after the delay Discord asks for
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .json::<RateLimited>()
                .await
                .map(|r| r.retry_after)
                .unwrap_or(1.0);
            warn!("Discord rate limit hit, retrying in {:.1}s", wait);
            tokio::time::sleep(Duration::from_secs_f64(wait.clamp(0.0, 60.0))).await;
            response = self.post(&message).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Discord returned error {}: {}", status, error_text);
        }

        info!("Posted job '{}' to Discord", job.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_carries_action_buttons() {
        let job = JobRecord::new("adzuna", Some("4711".into()), "Admin", "https://x/4711");
        let message = DiscordNotifier::build_message(&job, &[]);
        let json = serde_json::to_value(&message).unwrap();

        let buttons = &json["components"][0]["components"];
        assert_eq!(json["components"][0]["type"], 1);
        assert_eq!(buttons[0]["custom_id"], "save|adzuna:4711");
        assert_eq!(buttons[0]["style"], 3);
        assert_eq!(buttons[1]["custom_id"], "skip|adzuna:4711");
        assert!(json["content"].as_str().unwrap().starts_with("💼 **Admin**"));
    }

    #[test]
    fn test_custom_id_is_bounded() {
        let long_key = "x".repeat(150);
        assert_eq!(custom_id("save", &long_key).chars().count(), MAX_CUSTOM_ID_CHARS);
    }
}
