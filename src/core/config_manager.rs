// src/core/config_manager.rs
//! Process-wide settings read from the environment

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub data_path: PathBuf,
    pub templates_path: PathBuf,
    pub output_path: PathBuf,
    pub logs_path: PathBuf,
    pub search_config_path: PathBuf,
    pub seen_jobs_path: PathBuf,
    pub database_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AdzunaCredentials {
    pub app_id: String,
    pub app_key: String,
    pub country: String,
    pub results_per_page: u32,
}

#[derive(Debug, Clone)]
pub struct DiscordSettings {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub adzuna: Option<AdzunaCredentials>,
    pub discord: Option<DiscordSettings>,
    pub error_webhook_url: Option<String>,
    pub mail_relay_url: Option<String>,
    pub sender_name: String,
    pub adapter_timeout_seconds: u64,
    pub search_interval_minutes: u64,
    pub port: Option<u16>,
}

impl ConfigManager {
    /// Load all configurations
    pub fn load() -> Result<Self> {
        let environment = Self::load_environment()?;
        let service = Self::load_service()?;

        Ok(Self {
            environment,
            service,
        })
    }

    fn load_environment() -> Result<EnvironmentConfig> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());

        let base_dir = if env == "production" {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };

        Ok(EnvironmentConfig::rooted_at(base_dir))
    }

    fn load_service() -> Result<ServiceConfig> {
        let adzuna = match (optional_var("ADZUNA_APP_ID"), optional_var("ADZUNA_APP_KEY")) {
            (Some(app_id), Some(app_key)) => Some(AdzunaCredentials {
                app_id,
                app_key,
                country: optional_var("ADZUNA_COUNTRY").unwrap_or_else(|| "de".to_string()),
                results_per_page: parsed_var("ADZUNA_RESULTS_PER_PAGE", 10)?,
            }),
            _ => None,
        };

        let discord = match (
            optional_var("DISCORD_BOT_TOKEN"),
            optional_var("DISCORD_CHANNEL_ID"),
        ) {
            (Some(bot_token), Some(channel_id)) => Some(DiscordSettings {
                bot_token,
                channel_id,
            }),
            _ => None,
        };

        let port = match optional_var("ROCKET_PORT") {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?,
            ),
            None => None,
        };

        let service = ServiceConfig {
            adzuna,
            discord,
            error_webhook_url: optional_var("ERROR_WEBHOOK_URL"),
            mail_relay_url: optional_var("MAIL_RELAY_URL"),
            sender_name: optional_var("SENDER_NAME")
                .unwrap_or_else(|| "Max Mustermann".to_string()),
            adapter_timeout_seconds: parsed_var("ADAPTER_TIMEOUT_SECS", 20)?,
            search_interval_minutes: parsed_var("SEARCH_INTERVAL_MINUTES", 60)?,
            port,
        };
        service.validate()?;
        Ok(service)
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        use crate::core::FsOps;

        FsOps::ensure_dir_exists(&self.environment.data_path).await?;
        FsOps::ensure_dir_exists(&self.environment.templates_path).await?;
        FsOps::ensure_dir_exists(&self.environment.output_path).await?;
        FsOps::ensure_dir_exists(&self.environment.logs_path).await?;

        Ok(())
    }
}

impl EnvironmentConfig {
    pub fn rooted_at(base_dir: PathBuf) -> Self {
        let data_path = base_dir.join("data");
        Self {
            templates_path: base_dir.join("templates"),
            output_path: base_dir.join("out"),
            logs_path: base_dir.join("logs"),
            search_config_path: data_path.join("config.json"),
            seen_jobs_path: data_path.join("jobs_seen.json"),
            database_path: data_path.join("jobbot.db"),
            data_path,
        }
    }

    pub fn cover_letter_template_path(&self) -> PathBuf {
        self.templates_path.join("anschreiben_vorlage.txt")
    }

    /// Documents attached to every application, when present
    pub fn application_documents(&self) -> Vec<PathBuf> {
        vec![
            self.templates_path.join("lebenslauf.pdf"),
            self.templates_path.join("zeugnisse.pdf"),
        ]
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.search_interval_minutes == 0 {
            anyhow::bail!("SEARCH_INTERVAL_MINUTES must be at least 1");
        }
        if self.adapter_timeout_seconds == 0 {
            anyhow::bail!("ADAPTER_TIMEOUT_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_seconds)
    }

    pub fn search_interval(&self) -> Duration {
        Duration::from_secs(self.search_interval_minutes.saturating_mul(60))
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match optional_var(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_rooted_at_base_dir() {
        let env = EnvironmentConfig::rooted_at(PathBuf::from("/app"));

        assert_eq!(env.search_config_path, PathBuf::from("/app/data/config.json"));
        assert_eq!(env.seen_jobs_path, PathBuf::from("/app/data/jobs_seen.json"));
        assert_eq!(env.database_path, PathBuf::from("/app/data/jobbot.db"));
        assert_eq!(
            env.cover_letter_template_path(),
            PathBuf::from("/app/templates/anschreiben_vorlage.txt")
        );
    }

    fn service(search_interval_minutes: u64, adapter_timeout_seconds: u64) -> ServiceConfig {
        ServiceConfig {
            adzuna: None,
            discord: None,
            error_webhook_url: None,
            mail_relay_url: None,
            sender_name: "Max Mustermann".to_string(),
            adapter_timeout_seconds,
            search_interval_minutes,
            port: None,
        }
    }

    #[test]
    fn test_zero_interval_and_timeout_are_rejected() {
        assert!(service(60, 20).validate().is_ok());
        assert!(service(0, 20).validate().is_err());
        assert!(service(60, 0).validate().is_err());
    }

    #[test]
    fn test_search_interval_saturates() {
        assert_eq!(service(2, 20).search_interval(), Duration::from_secs(120));
        assert_eq!(
            service(u64::MAX, 20).search_interval(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<u64>("ADAPTER_TIMEOUT_SECS", "15").unwrap(), 15);
        assert!(parse_value::<u64>("ADAPTER_TIMEOUT_SECS", "soon").is_err());
    }
}
