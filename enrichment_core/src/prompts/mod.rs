//! Prompt templates for the enrichment, detection and revision calls.
//!
//! Everything here is a pure function of its inputs. Templates are string
//! literals; dynamic sections are appended only when they have content.

mod enrichment;
mod revision;

pub use enrichment::*;
pub use revision::*;

use campaign_model::{EntityType, Vocabulary};

use crate::context_builder::RetrievedContext;

const ENRICHMENT_SYSTEM_PROMPT: &str = "\
You are a campaign analyst producing structured suggestions for a tabletop \
role-playing knowledge base. You read narrative text (session notes, chapter \
prose) and propose updates for ONE entity: a better description, dated log \
entries for what happened to it, and relationships to other entities.

Only suggest what the text supports. Do not repeat facts already present in \
the current description. Do not propose relationships that already exist.

Respond with a single JSON object and nothing else:
{
  \"descriptionUpdates\": [{\"currentDescription\": \"...\", \"suggestedDescription\": \"...\", \"rationale\": \"...\"}],
  \"logEntries\": [{\"content\": \"...\", \"occurredAt\": \"... or null\"}],
  \"relationships\": [{\"sourceEntityId\": \"...\", \"sourceEntityName\": \"...\", \"targetEntityId\": \"...\", \"targetEntityName\": \"...\", \"relationshipType\": \"...\", \"description\": \"...\"}]
}
Use empty arrays when there is nothing to suggest.";

const NEW_ENTITY_SYSTEM_PROMPT: &str = "\
You are a campaign analyst for a tabletop role-playing knowledge base. You \
read narrative text and identify named characters, places, items, groups and \
other entities that are NOT already tracked.

Ignore every entity in the known list, including obvious alternate spellings. \
Ignore generic nouns (\"the guard\", \"a tavern\").

Respond with a single JSON object and nothing else:
{
  \"entities\": [{\"name\": \"...\", \"entityType\": \"...\", \"description\": \"...\", \"reasoning\": \"...\"}]
}
Use an empty array when nothing new appears.";

/// System prompt for entity enrichment, extended with the controlled
/// vocabulary when one is supplied.
pub fn enrichment_system_prompt(vocabulary: Option<&Vocabulary>) -> String {
    with_vocabulary(ENRICHMENT_SYSTEM_PROMPT, vocabulary)
}

/// System prompt for new-entity detection.
///
/// The allowed entity types are always listed, since detection output is
/// validated against the closed [`EntityType`] set.
pub fn new_entity_system_prompt(vocabulary: Option<&Vocabulary>) -> String {
    let mut prompt = with_vocabulary(NEW_ENTITY_SYSTEM_PROMPT, vocabulary);
    let types: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
    prompt.push_str("\n\n`entityType` must be one of: ");
    prompt.push_str(&types.join(", "));
    prompt.push('.');
    prompt
}

fn with_vocabulary(base: &str, vocabulary: Option<&Vocabulary>) -> String {
    let mut prompt = base.to_string();
    if let Some(vocab) = vocabulary.filter(|v| !v.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(&render_vocabulary(vocab));
    }
    prompt
}

/// Render the valid entity and relationship types as a prompt section.
pub fn render_vocabulary(vocabulary: &Vocabulary) -> String {
    let mut out = String::new();

    let entity_types: Vec<_> = vocabulary.concrete_entity_types().collect();
    if !entity_types.is_empty() {
        out.push_str("## Valid Entity Types\n");
        for t in entity_types {
            if t.description.trim().is_empty() {
                out.push_str(&format!("- {}\n", t.name));
            } else {
                out.push_str(&format!("- {}: {}\n", t.name, t.description.trim()));
            }
        }
        out.push('\n');
    }

    if !vocabulary.relationship_types.is_empty() {
        out.push_str("## Valid Relationship Types\n");
        for r in &vocabulary.relationship_types {
            out.push_str(&format!(
                "- {} (valid source types: {}; valid target types: {})\n",
                r.name,
                list_or_any(&r.valid_source_types),
                list_or_any(&r.valid_target_types),
            ));
        }
        out.push('\n');
    }

    out.push_str("Use only the types listed above. Do not invent new entity or relationship types.");
    out
}

fn list_or_any(types: &[String]) -> String {
    if types.is_empty() {
        "any".to_string()
    } else {
        types.join(", ")
    }
}

/// Append the retrieved snippets and schema text, if any.
fn push_retrieved_context(prompt: &mut String, context: &RetrievedContext) {
    if !context.results.is_empty() {
        prompt.push_str("## Related Campaign Content\n");
        for r in &context.results {
            prompt.push_str(&format!(
                "[{}: {}]\n{}\n\n",
                r.source_table,
                r.source_name,
                r.chunk_content.trim()
            ));
        }
    }

    if let Some(schema) = context.schema() {
        prompt.push_str("## Game System Schema\n");
        prompt.push_str(schema);
        prompt.push_str("\n\n");
    }
}
