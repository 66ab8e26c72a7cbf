//! Suggestion payloads carried by triage items.

use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::{EntityId, EntityType};

/// A proposed rewrite of an entity's description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DescriptionUpdate {
    pub current_description: String,
    pub suggested_description: String,
    pub rationale: String,
}

/// A dated entry for an entity's chronological log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntry {
    pub content: String,
    /// Free-form in-world time ("Session 12", "the night of the storm").
    pub occurred_at: Option<String>,
}

/// A proposed edge between two entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipSuggestion {
    #[serde(deserialize_with = "lenient_entity_id")]
    pub source_entity_id: Option<EntityId>,
    pub source_entity_name: String,
    #[serde(deserialize_with = "lenient_entity_id")]
    pub target_entity_id: Option<EntityId>,
    pub target_entity_name: String,
    pub relationship_type: String,
    pub description: String,
}

/// A net-new entity the content introduces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntitySuggestion {
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reasoning: String,
}

/// The payload of a triage item, one variant per detection kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionPayload {
    DescriptionUpdate(DescriptionUpdate),
    LogEntry(LogEntry),
    Relationship(RelationshipSuggestion),
    NewEntity(NewEntitySuggestion),
}

impl SuggestionPayload {
    /// The free-text description or suggestion carried by this payload, as
    /// fed to a content revision.
    pub fn revision_note(&self) -> Option<(&'static str, &str)> {
        let note = match self {
            SuggestionPayload::DescriptionUpdate(u) => ("suggestion", u.suggested_description.as_str()),
            SuggestionPayload::LogEntry(e) => ("suggestion", e.content.as_str()),
            SuggestionPayload::Relationship(r) => ("description", r.description.as_str()),
            SuggestionPayload::NewEntity(n) => ("description", n.description.as_str()),
        };
        if note.1.trim().is_empty() {
            None
        } else {
            Some(note)
        }
    }
}

/// Accept ids as UUID strings; anything else (numbers, names, garbage) becomes
/// `None` instead of failing the whole document.
fn lenient_entity_id<'de, D>(deserializer: D) -> Result<Option<EntityId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => EntityId::parse(&s).filter(|id| !id.is_nil()),
        _ => None,
    })
}
