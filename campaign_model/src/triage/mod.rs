//! Triage records: machine-generated suggestions awaiting a human
//! accept/dismiss decision.
//!
//! Lifecycle:
//! - Every item is created `Pending` by an agent.
//! - Review moves it to exactly one terminal state: `Accepted`, `NewEntity`
//!   or `Dismissed`.
//! - `resolved_entity_id` is set if and only if the resolution is `Accepted`
//!   or `NewEntity`.

mod job;
mod suggestion;

pub use job::*;
pub use suggestion::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntityId;

/// Errors raised by illegal lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriageError {
    #[error("item {position} is already resolved as {resolution:?}")]
    AlreadyResolved {
        position: usize,
        resolution: Resolution,
    },

    #[error("resolution {0:?} requires a resolved entity id")]
    MissingResolvedEntity(Resolution),
}

/// What kind of detection produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    /// An explicit link to a known entity (identification phase).
    WikiLink,
    /// A plain-text mention of a known entity name (identification phase).
    UntaggedMention,
    DescriptionUpdate,
    LogEntry,
    RelationshipSuggestion,
    NewEntitySuggestion,
}

impl DetectionType {
    /// The detection type matching a payload variant.
    pub fn for_payload(payload: &SuggestionPayload) -> Self {
        match payload {
            SuggestionPayload::DescriptionUpdate(_) => DetectionType::DescriptionUpdate,
            SuggestionPayload::LogEntry(_) => DetectionType::LogEntry,
            SuggestionPayload::Relationship(_) => DetectionType::RelationshipSuggestion,
            SuggestionPayload::NewEntity(_) => DetectionType::NewEntitySuggestion,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::WikiLink => "wiki_link",
            DetectionType::UntaggedMention => "untagged_mention",
            DetectionType::DescriptionUpdate => "description_update",
            DetectionType::LogEntry => "log_entry",
            DetectionType::RelationshipSuggestion => "relationship_suggestion",
            DetectionType::NewEntitySuggestion => "new_entity_suggestion",
        }
    }
}

/// Analysis phase an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Identification,
    Enrichment,
}

/// Review outcome of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Pending,
    Accepted,
    NewEntity,
    Dismissed,
}

impl Resolution {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Resolution::Pending)
    }
}

/// A single suggestion in the triage queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysisItem {
    pub job_id: JobId,
    /// Position within the job's output, assigned by the pipeline.
    pub position: usize,
    pub detection_type: DetectionType,
    /// The span of source text (or entity name) the item is about.
    pub matched_text: String,
    pub entity_id: Option<EntityId>,
    pub suggested_content: Option<SuggestionPayload>,
    pub phase: Phase,
    pub resolution: Resolution,
    pub resolved_entity_id: Option<EntityId>,
    /// Name of the agent that produced the item.
    pub agent_name: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ContentAnalysisItem {
    /// Create a pending enrichment-phase item carrying a suggestion.
    ///
    /// Job, position and agent name are stamped later by the pipeline.
    pub fn suggestion(
        matched_text: impl Into<String>,
        entity_id: Option<EntityId>,
        payload: SuggestionPayload,
    ) -> Self {
        Self {
            job_id: JobId::nil(),
            position: 0,
            detection_type: DetectionType::for_payload(&payload),
            matched_text: matched_text.into(),
            entity_id,
            suggested_content: Some(payload),
            phase: Phase::Enrichment,
            resolution: Resolution::Pending,
            resolved_entity_id: None,
            agent_name: String::new(),
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Create a pending identification-phase item for a detected mention.
    pub fn detection(
        detection_type: DetectionType,
        matched_text: impl Into<String>,
        entity_id: Option<EntityId>,
    ) -> Self {
        Self {
            job_id: JobId::nil(),
            position: 0,
            detection_type,
            matched_text: matched_text.into(),
            entity_id,
            suggested_content: None,
            phase: Phase::Identification,
            resolution: Resolution::Pending,
            resolved_entity_id: None,
            agent_name: String::new(),
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.resolution == Resolution::Pending
    }

    /// Accept the suggestion as applying to `entity_id`.
    pub fn accept(&mut self, entity_id: EntityId) -> Result<(), TriageError> {
        self.resolve(Resolution::Accepted, Some(entity_id))
    }

    /// Resolve by creating (or linking) a new entity.
    pub fn resolve_as_new_entity(&mut self, entity_id: EntityId) -> Result<(), TriageError> {
        self.resolve(Resolution::NewEntity, Some(entity_id))
    }

    /// Dismiss the suggestion.
    pub fn dismiss(&mut self) -> Result<(), TriageError> {
        self.resolve(Resolution::Dismissed, None)
    }

    fn resolve(
        &mut self,
        resolution: Resolution,
        entity_id: Option<EntityId>,
    ) -> Result<(), TriageError> {
        if self.resolution.is_terminal() {
            return Err(TriageError::AlreadyResolved {
                position: self.position,
                resolution: self.resolution,
            });
        }
        let entity_id = match resolution {
            Resolution::Accepted | Resolution::NewEntity => match entity_id {
                Some(id) if !id.is_nil() => Some(id),
                _ => return Err(TriageError::MissingResolvedEntity(resolution)),
            },
            _ => None,
        };

        self.resolution = resolution;
        self.resolved_entity_id = entity_id;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}
