// src/cli.rs
use crate::actions::ActionDispatcher;
use crate::application::{ApplicationService, CoverLetter, MailRelayClient};
use crate::core::{ConfigManager, SearchConfigStore, SearchConfigUpdate, WorkType};
use crate::database::{DatabaseConfig, FavoriteRepository};
use crate::discovery::DiscoveryEngine;
use crate::notifier::{DiscordNotifier, ErrorReporter, LogNotifier, Notifier};
use crate::runner::SearchRunner;
use crate::scheduler::Scheduler;
use crate::seen_store::SeenStore;
use crate::sources::{AdzunaSource, ArbeitsagenturSource, SourceAdapter};
use crate::utils::split_keywords;
use crate::web::{start_web_server, ServerState};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "jobbot")]
#[command(about = "Polls job sources and posts new offers to a chat channel", version)]
pub struct BotCli {
    #[command(subcommand)]
    pub command: Option<BotCommand>,
}

#[derive(Subcommand)]
pub enum BotCommand {
    /// Run the scheduler and, when ROCKET_PORT is set, the control API
    Run,
    /// Search once and notify new jobs
    Search {
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Show or change the search configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Manage saved jobs
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        radius: Option<u32>,
        /// Comma separated, replaces the current list
        #[arg(long)]
        keywords: Option<String>,
        /// all, remote, hybrid or onsite
        #[arg(long)]
        work_type: Option<String>,
        /// 24-hour HH:MM
        #[arg(long)]
        execution_time: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum FavoritesCommand {
    List,
    Remove { source: String, job_id: String },
    /// Contact address used when applying
    SetEmail {
        source: String,
        job_id: String,
        email: String,
    },
    Clear,
}

/// Everything the commands share, wired from the environment.
pub struct BotContext {
    pub config: ConfigManager,
    pub config_store: SearchConfigStore,
    pub database: DatabaseConfig,
    pub reporter: Arc<ErrorReporter>,
    pub runner: Arc<SearchRunner>,
    pub dispatcher: ActionDispatcher,
}

impl BotContext {
    pub async fn assemble(config: ConfigManager) -> Result<Self> {
        config.ensure_directories().await?;
        let env = &config.environment;
        let service = &config.service;

        let mut database = DatabaseConfig::new(env.database_path.clone());
        database.init_pool().await?;
        database.migrate().await?;

        let reporter = Arc::new(ErrorReporter::new(service.error_webhook_url.clone())?);

        let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        match &service.adzuna {
            Some(adzuna) => sources.push(Arc::new(AdzunaSource::new(
                adzuna.app_id.clone(),
                adzuna.app_key.clone(),
                adzuna.country.clone(),
                adzuna.results_per_page,
            )?)),
            None => warn!("ADZUNA_APP_ID / ADZUNA_APP_KEY not set, Adzuna source disabled"),
        }
        sources.push(Arc::new(ArbeitsagenturSource::new()?));

        let notifier: Arc<dyn Notifier> = match &service.discord {
            Some(discord) => Arc::new(DiscordNotifier::new(
                discord.bot_token.clone(),
                discord.channel_id.clone(),
            )?),
            None => {
                warn!("Discord not configured, new jobs are only logged");
                Arc::new(LogNotifier)
            }
        };

        let engine = DiscoveryEngine::new(
            SeenStore::new(env.seen_jobs_path.clone()),
            sources,
            service.adapter_timeout(),
        )
        .with_error_reporter(Arc::clone(&reporter));

        let config_store = SearchConfigStore::new(env.search_config_path.clone());
        let runner = SearchRunner::new(
            Arc::new(engine),
            config_store.clone(),
            notifier,
            Arc::clone(&reporter),
        )
        .with_database(database.pool()?.clone());

        let mailer = match &service.mail_relay_url {
            Some(url) => Some(MailRelayClient::new(url.clone())?),
            None => None,
        };
        let applications = ApplicationService::new(
            CoverLetter::new(
                env.cover_letter_template_path(),
                env.output_path.clone(),
                service.sender_name.clone(),
            ),
            env.application_documents(),
            service.sender_name.clone(),
            mailer,
        );
        let dispatcher =
            ActionDispatcher::new(database.pool()?.clone()).with_applications(Arc::new(applications));

        Ok(Self {
            config,
            config_store,
            database,
            reporter,
            runner: Arc::new(runner),
            dispatcher,
        })
    }
}

pub async fn handle_command(cli: BotCli, context: BotContext) -> Result<()> {
    match cli.command.unwrap_or(BotCommand::Run) {
        BotCommand::Run => run(context).await,
        BotCommand::Search { days } => {
            let summary = context.runner.run_search(days).await?;
            println!(
                "✅ {} new jobs, {} notified, {} notification failures",
                summary.found, summary.notified, summary.failed_notifications
            );
            Ok(())
        }
        BotCommand::Config { command } => handle_config_command(command, &context.config_store).await,
        BotCommand::Favorites { command } => handle_favorites_command(command, &context.database).await,
    }
}

async fn run(context: BotContext) -> Result<()> {
    context
        .reporter
        .send_healthcheck(env!("CARGO_PKG_VERSION"))
        .await;

    let scheduler = Scheduler::new(
        Arc::clone(&context.runner),
        context.config.service.search_interval(),
    );

    match context.config.service.port {
        Some(port) => {
            let state = ServerState {
                runner: Arc::clone(&context.runner),
                config_store: context.config_store.clone(),
                pool: context.database.pool()?.clone(),
                dispatcher: context.dispatcher.clone(),
            };

            tokio::select! {
                _ = scheduler.run() => Ok(()),
                result = start_web_server(state, port) => result,
            }
        }
        None => {
            info!("ROCKET_PORT not set, control API disabled");
            scheduler.run().await;
            Ok(())
        }
    }
}

async fn handle_config_command(command: ConfigCommand, store: &SearchConfigStore) -> Result<()> {
    let config = match command {
        ConfigCommand::Show => store.load().await,
        ConfigCommand::Set {
            location,
            radius,
            keywords,
            work_type,
            execution_time,
        } => {
            let work_type = work_type.as_deref().map(WorkType::from_str).transpose()?;
            let update = SearchConfigUpdate {
                location,
                radius,
                keywords: keywords.as_deref().map(split_keywords),
                work_type,
                execution_time,
            };

            match store.update(update).await {
                Ok(config) => {
                    println!("✅ Search configuration updated");
                    config
                }
                Err(e) => {
                    error!("Failed to update search configuration: {:#}", e);
                    println!("❌ Error: {:#}", e);
                    return Err(e);
                }
            }
        }
    };

    println!("📍 Location: {} ({} km)", config.location, config.radius);
    println!("🔎 Keywords: {}", config.keywords.join(", "));
    println!("🏠 Work type: {}", config.work_type);
    println!("⏰ Daily run: {}", config.execution_time);
    Ok(())
}

async fn handle_favorites_command(command: FavoritesCommand, database: &DatabaseConfig) -> Result<()> {
    let repo = FavoriteRepository::new(database.pool()?);

    match command {
        FavoritesCommand::List => {
            let favorites = repo.list().await?;
            if favorites.is_empty() {
                println!("No saved jobs");
            }
            for favorite in favorites {
                let job = &favorite.job;
                println!(
                    "💼 {} | {} | {}:{}",
                    job.title,
                    job.company_or_unknown(),
                    job.source,
                    job.id.as_deref().unwrap_or("-")
                );
                println!("   🔗 {}", job.url);
                if let Some(email) = &favorite.email {
                    println!("   📧 {}", email);
                }
            }
        }
        FavoritesCommand::Remove { source, job_id } => {
            if repo.remove(&source, &job_id).await? {
                println!("✅ Removed {}:{}", source, job_id);
            } else {
                println!("❌ No saved job {}:{}", source, job_id);
            }
        }
        FavoritesCommand::SetEmail {
            source,
            job_id,
            email,
        } => {
            if repo.set_email(&source, &job_id, &email).await? {
                println!("✅ Contact email set for {}:{}", source, job_id);
            } else {
                println!("❌ No saved job {}:{}", source, job_id);
            }
        }
        FavoritesCommand::Clear => {
            let removed = repo.clear().await?;
            println!("✅ Removed {} saved jobs", removed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        BotCli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_days() {
        let cli = BotCli::try_parse_from(["jobbot", "search", "--days", "7"]).unwrap();
        assert!(matches!(cli.command, Some(BotCommand::Search { days: 7 })));
    }

    #[test]
    fn test_parse_config_set() {
        let cli = BotCli::try_parse_from([
            "jobbot",
            "config",
            "set",
            "--keywords",
            "devops, linux",
            "--work-type",
            "remote",
        ])
        .unwrap();

        let Some(BotCommand::Config {
            command: ConfigCommand::Set {
                keywords, work_type, ..
            },
        }) = cli.command
        else {
            panic!("expected config set");
        };
        assert_eq!(keywords.as_deref(), Some("devops, linux"));
        assert_eq!(work_type.as_deref(), Some("remote"));
    }

    #[test]
    fn test_no_command_defaults_to_run() {
        let cli = BotCli::try_parse_from(["jobbot"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[tokio::test]
    async fn test_config_set_rejects_unknown_work_type() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SearchConfigStore::new(dir.path().join("config.json"));

        let command = ConfigCommand::Set {
            location: None,
            radius: None,
            keywords: None,
            work_type: Some("sometimes".to_string()),
            execution_time: None,
        };
        assert!(handle_config_command(command, &store).await.is_err());
    }
}
