// src/utils.rs
use anyhow::{Context, Result};
use chrono::NaiveTime;

/// Normalize a name for file system usage
pub fn normalize_file_name(name: &str) -> String {
    let normalized: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    normalized
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Collapse scraped text onto one line with single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a 24-hour `HH:MM` time of day
pub fn parse_execution_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("Invalid execution time '{}', expected HH:MM", value))
}

/// Trim keywords, drop empty ones and keep the first occurrence of each
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.as_ref().trim();
        if !keyword.is_empty() && !result.iter().any(|k| k == keyword) {
            result.push(keyword.to_string());
        }
    }
    result
}

/// Split a comma separated keyword list as typed by a user
pub fn split_keywords(input: &str) -> Vec<String> {
    normalize_keywords(input.split(','))
}
