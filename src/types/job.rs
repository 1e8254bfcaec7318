// src/types/job.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One posting discovered by any source adapter.
///
/// `id` is only unique within its `source`; records without an id never
/// reach the seen-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub url: String,
    pub source: String,
}

impl JobRecord {
    pub fn new(source: &str, id: Option<String>, title: &str, url: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            company: None,
            location: None,
            url: url.to_string(),
            source: source.to_string(),
        }
    }

    pub fn with_company(mut self, company: Option<String>) -> Self {
        self.company = company;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Source-scoped identity, `None` when the record has no usable id or
    /// its source name contains `:`
    pub fn seen_key(&self) -> Option<SeenKey> {
        if !is_valid_source_name(&self.source) {
            return None;
        }
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| SeenKey::new(&self.source, id))
    }

    pub fn company_or_unknown(&self) -> &str {
        self.company.as_deref().unwrap_or("Unbekannt")
    }

    pub fn location_or_unknown(&self) -> &str {
        self.location.as_deref().unwrap_or("Unbekannt")
    }
}

/// Composite `(source, id)` identity stored in the seen-set as `source:id`.
///
/// Source names must not contain `:`; ids may. The first `:` always ends the
/// source name, which keeps the key unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenKey(String);

impl SeenKey {
    pub fn new(source: &str, id: &str) -> Self {
        Self(format!("{}:{}", source, id))
    }

    /// `(source, id)`; `None` for legacy keys stored without a source
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.0
            .split_once(':')
            .filter(|(source, id)| !source.is_empty() && !id.is_empty())
    }

    /// Wrap an identifier read back from disk as-is
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Source names end at the first `:` of a [`SeenKey`]
pub fn is_valid_source_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(':')
}

impl fmt::Display for SeenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A saved job plus the user's annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub email: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Follow-up action a user triggers on a notified job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "job", rename_all = "lowercase")]
pub enum JobAction {
    Save(JobRecord),
    Skip(JobRecord),
    Remove(JobRecord),
    Apply(JobRecord),
}

impl JobAction {
    pub fn job(&self) -> &JobRecord {
        match self {
            JobAction::Save(job)
            | JobAction::Skip(job)
            | JobAction::Remove(job)
            | JobAction::Apply(job) => job,
        }
    }

    /// Inverse of [`JobAction::name`]
    pub fn from_name(name: &str, job: JobRecord) -> Option<Self> {
        match name {
            "save" => Some(JobAction::Save(job)),
            "skip" => Some(JobAction::Skip(job)),
            "remove" => Some(JobAction::Remove(job)),
            "apply" => Some(JobAction::Apply(job)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobAction::Save(_) => "save",
            JobAction::Skip(_) => "skip",
            JobAction::Remove(_) => "remove",
            JobAction::Apply(_) => "apply",
        }
    }
}
