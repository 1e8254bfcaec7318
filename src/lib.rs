//! Job notification bot: polls job sources, drops offers it already posted,
//! and notifies a chat channel about the rest.

pub mod actions;
pub mod application;
pub mod cli;
pub mod core;
pub mod database;
pub mod discovery;
pub mod notifier;
pub mod runner;
pub mod scheduler;
pub mod seen_store;
pub mod sources;
pub mod types;
pub mod utils;
pub mod web;

pub use cli::{handle_command, BotCli, BotContext};
pub use discovery::{CycleReport, DiscoveryEngine};
pub use runner::{SearchRunner, SearchSummary};
pub use seen_store::{SeenSet, SeenStore};
pub use types::{JobAction, JobRecord, SeenKey};
