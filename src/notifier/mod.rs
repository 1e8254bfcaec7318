// src/notifier/mod.rs
//! Delivery of novel jobs and operational messages

use crate::types::JobRecord;
use anyhow::Result;
use async_trait::async_trait;
use regex::RegexBuilder;
use tracing::{info, warn};

pub mod discord;
pub mod error_webhook;

pub use discord::DiscordNotifier;
pub use error_webhook::ErrorReporter;

/// Discord rejects message content above this many characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, job: &JobRecord, keywords: &[String]) -> Result<()>;
}

/// Writes notifications to the log when no chat channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, job: &JobRecord, keywords: &[String]) -> Result<()> {
        info!("New job:\n{}", render_job_message(job, keywords));
        Ok(())
    }
}

/// Chat message for one job
pub fn render_job_message(job: &JobRecord, keywords: &[String]) -> String {
    let message = format!(
        "💼 **{}**\n🏢 {}\n📍 {}\n🔗 {}",
        highlight_keywords(&job.title, keywords),
        job.company_or_unknown(),
        job.location_or_unknown(),
        job.url
    );
    truncate_chars(&message, MAX_MESSAGE_CHARS)
}

/// Underline whole-word, case-insensitive keyword matches, longest keyword first
pub fn highlight_keywords(text: &str, keywords: &[String]) -> String {
    let mut sorted: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if sorted.is_empty() {
        return text.to_string();
    }
    sorted.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));

    let alternation = sorted
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern.replace_all(text, "__${0}__").into_owned(),
        Err(e) => {
            warn!("Failed to build keyword pattern: {}", e);
            text.to_string()
        }
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
