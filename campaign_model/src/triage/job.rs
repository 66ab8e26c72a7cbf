//! Analysis jobs and their derived progress counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContentAnalysisItem, Phase};

/// Unique identifier for an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item counts for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub total: usize,
    pub resolved: usize,
}

impl PhaseProgress {
    pub fn is_complete(&self) -> bool {
        self.resolved == self.total
    }
}

/// One analysis run over a piece of source content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentJob {
    pub id: JobId,
    /// Where the content came from, e.g. `("sessions", "<uuid>")`.
    pub source_table: String,
    pub source_id: String,
    pub identification: PhaseProgress,
    pub enrichment: PhaseProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentJob {
    /// Create a new job for a content source.
    pub fn new(source_table: impl Into<String>, source_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_table: source_table.into(),
            source_id: source_id.into(),
            identification: PhaseProgress::default(),
            enrichment: PhaseProgress::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute the progress counters from this job's items.
    ///
    /// Counters are derived data: they are only ever written here.
    pub fn recount(&mut self, items: &[ContentAnalysisItem]) {
        let mut identification = PhaseProgress::default();
        let mut enrichment = PhaseProgress::default();

        for item in items.iter().filter(|i| i.job_id == self.id) {
            let progress = match item.phase {
                Phase::Identification => &mut identification,
                Phase::Enrichment => &mut enrichment,
            };
            progress.total += 1;
            if item.resolution.is_terminal() {
                progress.resolved += 1;
            }
        }

        self.identification = identification;
        self.enrichment = enrichment;
        self.updated_at = Utc::now();
    }

    /// Whether every item in every phase has been resolved.
    pub fn is_complete(&self) -> bool {
        self.identification.is_complete() && self.enrichment.is_complete()
    }
}
