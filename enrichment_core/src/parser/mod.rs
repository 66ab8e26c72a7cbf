//! Response parsing for model output.
//!
//! Model output is untrusted. Every parser here returns a value, never an
//! error: code fences are stripped, and empty or undecodable text degrades to
//! an empty response with every list initialised. Decode failures are logged
//! with a bounded excerpt of the offending text.

use campaign_model::{DescriptionUpdate, LogEntry, RelationshipSuggestion};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Characters of offending text included in decode-failure logs.
const EXCERPT_CHARS: usize = 200;

/// Parsed output of an entity enrichment call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichmentResponse {
    #[serde(deserialize_with = "nullable_vec")]
    pub description_updates: Vec<DescriptionUpdate>,
    #[serde(deserialize_with = "nullable_vec")]
    pub log_entries: Vec<LogEntry>,
    #[serde(deserialize_with = "nullable_vec")]
    pub relationships: Vec<RelationshipSuggestion>,
}

impl EnrichmentResponse {
    pub fn is_empty(&self) -> bool {
        self.description_updates.is_empty() && self.log_entries.is_empty() && self.relationships.is_empty()
    }
}

/// One entity proposed by new-entity detection, before type validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedEntity {
    pub name: String,
    pub entity_type: String,
    pub description: String,
    pub reasoning: String,
}

/// Parsed output of a new-entity detection call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEntityResponse {
    #[serde(deserialize_with = "nullable_vec")]
    pub entities: Vec<DetectedEntity>,
}

/// Parsed output of a revision call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionResponse {
    pub revised_content: String,
    #[serde(default)]
    pub summary: String,
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing
/// ```` ``` ```` fence, then trim.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag, if any, up to the end of the fence line.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Parse an enrichment response. Never fails.
pub fn parse_enrichment_response(raw: &str) -> EnrichmentResponse {
    decode_or_default(raw, "enrichment")
}

/// Parse a new-entity detection response. Never fails.
pub fn parse_new_entity_response(raw: &str) -> NewEntityResponse {
    decode_or_default(raw, "new_entity")
}

/// Parse a revision response.
///
/// When the text is not the expected JSON object, the fence-stripped text is
/// taken as the revised content with an empty summary.
pub fn parse_revision_response(raw: &str) -> RevisionResponse {
    let text = strip_code_fences(raw);
    match serde_json::from_str::<RevisionResponse>(text) {
        Ok(response) => response,
        Err(e) => {
            warn!(
                error = %e,
                excerpt = %excerpt(text),
                "revision response was not JSON, using raw text"
            );
            RevisionResponse {
                revised_content: text.to_string(),
                summary: String::new(),
            }
        }
    }
}

fn decode_or_default<T>(raw: &str, kind: &'static str) -> T
where
    T: DeserializeOwned + Default,
{
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return T::default();
    }
    match serde_json::from_str::<T>(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                kind,
                error = %e,
                excerpt = %excerpt(text),
                "failed to decode model response"
            );
            T::default()
        }
    }
}

/// The first [`EXCERPT_CHARS`] characters of `text`.
fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Treat an explicit `null` list as empty.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
