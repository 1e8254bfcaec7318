// src/core/mod.rs
//! Configuration and file system services shared by the rest of the bot

pub mod config_manager;
pub mod fs_ops;
pub mod search_config;

pub use config_manager::ConfigManager;
pub use fs_ops::FsOps;
pub use search_config::{SearchConfig, SearchConfigStore, SearchConfigUpdate, WorkType};
