//! Entity enrichment and new-entity detection.

use campaign_model::{
    CampaignId, ContentAnalysisItem, EndpointKey, EndpointPair, Entity, EntityId, EntityType,
    NewEntitySuggestion, Relationship, RelationshipSuggestion, SuggestionPayload, Vocabulary,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EnrichmentConfig;
use crate::context_builder::RetrievedContext;
use crate::error::{EnrichmentError, Result};
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::parser::{parse_enrichment_response, parse_new_entity_response};
use crate::prompts::{enrichment_system_prompt, new_entity_prompt, new_entity_system_prompt, EnrichmentPrompt};

/// Issues enrichment and detection calls and turns the parsed output into
/// pending triage items.
pub struct EnrichmentAgent {
    llm: Arc<dyn CompletionProvider>,
    config: EnrichmentConfig,
    vocabulary: Option<Vocabulary>,
}

impl EnrichmentAgent {
    /// Create an agent over a completion provider.
    pub fn new(llm: Arc<dyn CompletionProvider>, config: EnrichmentConfig) -> Self {
        Self {
            llm,
            config,
            vocabulary: None,
        }
    }

    /// Constrain suggestions to a controlled vocabulary.
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Suggest description updates, log entries and relationships for one
    /// entity.
    ///
    /// An entity without identity or name, or empty content, is an
    /// [`EnrichmentError::InvalidInput`]. A failed completion call is
    /// propagated. Undecodable output yields no items.
    pub async fn enrich_entity(
        &self,
        entity: &Entity,
        content: &str,
        other_entities: &[Entity],
        relationships: &[Relationship],
        context: &RetrievedContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentAnalysisItem>> {
        if entity.id.is_nil() {
            return Err(EnrichmentError::InvalidInput("entity has no id".to_string()));
        }
        if entity.name.trim().is_empty() {
            return Err(EnrichmentError::InvalidInput(format!(
                "entity {} has no name",
                entity.id
            )));
        }
        if content.trim().is_empty() {
            return Err(EnrichmentError::InvalidInput("content is empty".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(EnrichmentError::Cancelled);
        }

        let request = CompletionRequest {
            system_prompt: enrichment_system_prompt(self.vocabulary.as_ref()),
            user_prompt: EnrichmentPrompt {
                entity,
                content,
                other_entities,
                relationships,
                context,
                content_char_budget: self.config.prompt.content_char_budget,
            }
            .render(),
            max_tokens: self.config.enrichment.max_tokens,
            temperature: self.config.enrichment.temperature,
        };
        let raw = self.llm.complete(&request, cancel).await?;
        let response = parse_enrichment_response(&raw);

        let mut items = Vec::new();

        for mut update in response.description_updates {
            if update.suggested_description.trim().is_empty() {
                continue;
            }
            if update.current_description.trim().is_empty() {
                update.current_description = entity.description.clone();
            }
            items.push(ContentAnalysisItem::suggestion(
                entity.name.clone(),
                Some(entity.id),
                SuggestionPayload::DescriptionUpdate(update),
            ));
        }

        for entry in response.log_entries {
            if entry.content.trim().is_empty() {
                continue;
            }
            items.push(ContentAnalysisItem::suggestion(
                entity.name.clone(),
                Some(entity.id),
                SuggestionPayload::LogEntry(entry),
            ));
        }

        let existing: HashSet<EndpointPair> = relationships.iter().map(Relationship::endpoint_pair).collect();
        let mut seen: HashSet<EndpointPair> = HashSet::new();
        for suggestion in response.relationships {
            let suggestion = normalize_endpoints(suggestion, entity, other_entities, relationships);
            let pair = suggestion_pair(&suggestion);
            if pair.is_self_loop() {
                debug!(entity = %entity.name, "dropping self-referencing relationship");
                continue;
            }
            if existing.contains(&pair) {
                debug!(
                    source = %suggestion.source_entity_name,
                    target = %suggestion.target_entity_name,
                    "relationship already exists, skipping"
                );
                continue;
            }
            if !seen.insert(pair) {
                continue;
            }
            let matched = format!(
                "{} -[{}]-> {}",
                suggestion.source_entity_name, suggestion.relationship_type, suggestion.target_entity_name
            );
            items.push(ContentAnalysisItem::suggestion(
                matched,
                Some(entity.id),
                SuggestionPayload::Relationship(suggestion),
            ));
        }

        info!(entity = %entity.name, items = items.len(), "entity enriched");
        Ok(items)
    }

    /// Find entities the content introduces that the campaign does not track
    /// yet.
    ///
    /// Unknown types are coerced to [`EntityType::Other`]; suggestions with an
    /// empty name, or naming a known entity, are dropped.
    pub async fn detect_new_entities(
        &self,
        campaign_id: CampaignId,
        content: &str,
        known_entities: &[Entity],
        context: &RetrievedContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentAnalysisItem>> {
        if content.trim().is_empty() {
            return Err(EnrichmentError::InvalidInput("content is empty".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(EnrichmentError::Cancelled);
        }

        let request = CompletionRequest {
            system_prompt: new_entity_system_prompt(self.vocabulary.as_ref()),
            user_prompt: new_entity_prompt(
                content,
                known_entities,
                context,
                self.config.prompt.content_char_budget,
            ),
            max_tokens: self.config.enrichment.max_tokens,
            temperature: self.config.enrichment.temperature,
        };
        let raw = self.llm.complete(&request, cancel).await?;
        let response = parse_new_entity_response(&raw);

        let mut seen: HashSet<String> = known_entities
            .iter()
            .map(|e| e.name.trim().to_lowercase())
            .collect();
        let mut items = Vec::new();
        for detected in response.entities {
            let name = detected.name.trim().to_string();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                continue;
            }
            let suggestion = NewEntitySuggestion {
                name: name.clone(),
                entity_type: EntityType::parse_lenient(&detected.entity_type),
                description: detected.description,
                reasoning: detected.reasoning,
            };
            items.push(ContentAnalysisItem::suggestion(
                name,
                None,
                SuggestionPayload::NewEntity(suggestion),
            ));
        }

        info!(%campaign_id, items = items.len(), "new entities detected");
        Ok(items)
    }
}

/// Fill in missing endpoint ids (by case-insensitive name) and missing names
/// (by id) from the entity, the entities mentioned alongside it, and the
/// endpoints of its stored relationships.
fn normalize_endpoints(
    mut suggestion: RelationshipSuggestion,
    entity: &Entity,
    others: &[Entity],
    relationships: &[Relationship],
) -> RelationshipSuggestion {
    let mut candidates: Vec<(EntityId, &str)> = std::iter::once(entity)
        .chain(others.iter())
        .map(|e| (e.id, e.name.as_str()))
        .collect();
    for rel in relationships {
        candidates.push((rel.source_entity_id, rel.source_entity_name.as_str()));
        candidates.push((rel.target_entity_id, rel.target_entity_name.as_str()));
    }
    candidates.retain(|(id, _)| !id.is_nil());

    let by_name = |name: &str| -> Option<EntityId> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        candidates
            .iter()
            .find(|(_, n)| n.trim().to_lowercase() == name)
            .map(|(id, _)| *id)
    };
    let name_of = |id: EntityId| -> Option<String> {
        candidates
            .iter()
            .find(|(c, n)| *c == id && !n.trim().is_empty())
            .map(|(_, n)| n.to_string())
    };

    if suggestion.source_entity_id.is_none() {
        suggestion.source_entity_id = by_name(&suggestion.source_entity_name);
    }
    if suggestion.target_entity_id.is_none() {
        suggestion.target_entity_id = by_name(&suggestion.target_entity_name);
    }
    if suggestion.source_entity_name.trim().is_empty() {
        if let Some(name) = suggestion.source_entity_id.and_then(&name_of) {
            suggestion.source_entity_name = name;
        }
    }
    if suggestion.target_entity_name.trim().is_empty() {
        if let Some(name) = suggestion.target_entity_id.and_then(&name_of) {
            suggestion.target_entity_name = name;
        }
    }

    suggestion
}

fn suggestion_pair(suggestion: &RelationshipSuggestion) -> EndpointPair {
    EndpointPair::new(
        EndpointKey::resolve(suggestion.source_entity_id, &suggestion.source_entity_name),
        EndpointKey::resolve(suggestion.target_entity_id, &suggestion.target_entity_name),
    )
}
