// src/types/mod.rs
pub mod job;

pub use job::{is_valid_source_name, FavoriteJob, JobAction, JobRecord, SeenKey};
