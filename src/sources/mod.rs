// src/sources/mod.rs
//! Job sources queried during a discovery cycle.

use crate::core::search_config::WorkType;
use crate::types::JobRecord;
use anyhow::Result;
use async_trait::async_trait;

pub mod adzuna;
pub mod arbeitsagentur;

pub use adzuna::AdzunaSource;
pub use arbeitsagentur::ArbeitsagenturSource;

/// Parameters of one adapter call: a single keyword against the current search settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub keyword: String,
    pub location: String,
    pub radius_km: u32,
    pub recency_days: u32,
    pub work_type: WorkType,
}

/// A job listing provider.
///
/// Implementations map the provider's response into [`JobRecord`]s and keep
/// the provider's ordering. Errors are recovered by the caller, so returning
/// `Err` only costs the results of this one call.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable name, also used to scope job ids in the seen-set
    fn name(&self) -> &str;

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobRecord>>;
}
