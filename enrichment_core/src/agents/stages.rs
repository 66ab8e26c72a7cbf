//! Pipeline-facing agents and the standard stage layout.

use async_trait::async_trait;
use campaign_model::{ContentAnalysisItem, DetectionType, Entity, SuggestionPayload};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use super::EnrichmentAgent;
use crate::error::{EnrichmentError, Result};
use crate::pipeline::{Agent, AgentContext, Pipeline, PipelineConfigError, Stage};

pub const MENTION_DETECTION: &str = "mention_detection";
pub const ENTITY_ENRICHMENT: &str = "entity_enrichment";
pub const NEW_ENTITY_DETECTION: &str = "new_entity_detection";

static WIKI_LINK_RE: OnceLock<Regex> = OnceLock::new();

fn wiki_link_re() -> &'static Regex {
    WIKI_LINK_RE.get_or_init(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("static regex is valid"))
}

/// The default layout: mention detection during identification, then entity
/// enrichment and new-entity detection.
pub fn standard_pipeline(agent: Arc<EnrichmentAgent>) -> std::result::Result<Pipeline, PipelineConfigError> {
    Pipeline::new(vec![
        Stage::new("identification").with_agent(Arc::new(MentionDetectionStage::new())),
        Stage::new("enrichment")
            .with_agent(Arc::new(EntityEnrichmentStage::new(agent.clone())))
            .with_agent(Arc::new(NewEntityDetectionStage::new(agent))),
    ])
}

/// Finds `[[wiki links]]` and plain mentions of known entities. Makes no
/// completion calls.
#[derive(Debug, Clone)]
pub struct MentionDetectionStage {
    name: String,
    dependencies: Vec<String>,
}

impl MentionDetectionStage {
    pub fn new() -> Self {
        Self {
            name: MENTION_DETECTION.to_string(),
            dependencies: Vec::new(),
        }
    }
}

impl Default for MentionDetectionStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for MentionDetectionStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<Vec<ContentAnalysisItem>> {
        let content = &ctx.input.content;
        let known = &ctx.input.known_entities;
        let find = |name: &str| {
            let name = name.trim().to_lowercase();
            known.iter().find(|e| e.name.trim().to_lowercase() == name)
        };

        let mut items = Vec::new();
        let mut linked: HashSet<String> = HashSet::new();

        // Step 1: Explicit links, each target once
        for caps in wiki_link_re().captures_iter(content) {
            let target = caps[1].trim();
            if target.is_empty() || !linked.insert(target.to_lowercase()) {
                continue;
            }
            items.push(ContentAnalysisItem::detection(
                DetectionType::WikiLink,
                &caps[0],
                find(target).map(|e| e.id),
            ));
        }

        // Step 2: Known entities named outside any link
        let unlinked = wiki_link_re().replace_all(content, " ");
        for entity in known {
            if linked.contains(&entity.name.trim().to_lowercase()) || !entity.is_mentioned_in(&unlinked) {
                continue;
            }
            items.push(ContentAnalysisItem::detection(
                DetectionType::UntaggedMention,
                entity.name.clone(),
                Some(entity.id),
            ));
        }

        Ok(items)
    }
}

/// Runs [`EnrichmentAgent::enrich_entity`] for every target entity.
pub struct EntityEnrichmentStage {
    name: String,
    dependencies: Vec<String>,
    agent: Arc<EnrichmentAgent>,
}

impl EntityEnrichmentStage {
    pub fn new(agent: Arc<EnrichmentAgent>) -> Self {
        Self {
            name: ENTITY_ENRICHMENT.to_string(),
            dependencies: Vec::new(),
            agent,
        }
    }

    /// Require another agent to run first.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

#[async_trait]
impl Agent for EntityEnrichmentStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// One entity failing does not stop the others. Cancellation does.
    async fn run(&self, ctx: &AgentContext<'_>) -> Result<Vec<ContentAnalysisItem>> {
        let mentioned = ctx.input.target_entities();
        let mut items = Vec::new();

        for target in &ctx.input.targets {
            if ctx.cancel.is_cancelled() {
                return Err(EnrichmentError::Cancelled);
            }
            let others: Vec<Entity> = mentioned
                .iter()
                .filter(|e| e.id != target.entity.id)
                .cloned()
                .collect();

            match self
                .agent
                .enrich_entity(
                    &target.entity,
                    &ctx.input.content,
                    &others,
                    &target.relationships,
                    ctx.retrieved,
                    ctx.cancel,
                )
                .await
            {
                Ok(found) => items.extend(found),
                Err(e) if ctx.cancel.is_cancelled() => return Err(e),
                Err(e) => warn!(entity = %target.entity.name, error = %e, "entity enrichment failed, skipping"),
            }
        }

        Ok(items)
    }
}

/// Runs [`EnrichmentAgent::detect_new_entities`] over the whole content.
pub struct NewEntityDetectionStage {
    name: String,
    dependencies: Vec<String>,
    agent: Arc<EnrichmentAgent>,
}

impl NewEntityDetectionStage {
    pub fn new(agent: Arc<EnrichmentAgent>) -> Self {
        Self {
            name: NEW_ENTITY_DETECTION.to_string(),
            dependencies: Vec::new(),
            agent,
        }
    }

    /// Require another agent to run first.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

#[async_trait]
impl Agent for NewEntityDetectionStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Suggestions already proposed by an earlier stage are dropped.
    async fn run(&self, ctx: &AgentContext<'_>) -> Result<Vec<ContentAnalysisItem>> {
        let proposed: HashSet<String> = ctx
            .prior_items
            .iter()
            .filter_map(|item| match &item.suggested_content {
                Some(SuggestionPayload::NewEntity(s)) => Some(s.name.trim().to_lowercase()),
                _ => None,
            })
            .collect();

        let items = self
            .agent
            .detect_new_entities(
                ctx.input.campaign_id,
                &ctx.input.content,
                &ctx.input.known_entities,
                ctx.retrieved,
                ctx.cancel,
            )
            .await?;

        let before = items.len();
        let items: Vec<ContentAnalysisItem> = items
            .into_iter()
            .filter(|item| !proposed.contains(&item.matched_text.trim().to_lowercase()))
            .collect();
        if items.len() < before {
            debug!(dropped = before - items.len(), "new entities already proposed earlier");
        }

        Ok(items)
    }
}
