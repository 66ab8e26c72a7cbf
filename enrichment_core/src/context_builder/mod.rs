//! Context Builder - assembles retrieved supporting text for prompts.
//!
//! Built once per pipeline run and shared read-only by every agent:
//! 1. **Availability**: Skip search entirely when semantic retrieval is off
//! 2. **Queries**: One content-summary query plus batched entity-name queries
//! 3. **Search**: Run each query; a failing query is logged and skipped
//! 4. **Merge**: Deduplicate, rank and trim to the token budget
//! 5. **Schema**: Attach the game-system schema text when a code is given

mod budget;

pub use budget::*;

use campaign_model::{CampaignId, Entity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::retrieval::{DisabledRetrieval, NoSchema, RetrievalAdapter, SchemaLoader, SearchResult};

/// Supporting context for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Ranked, deduplicated snippets.
    pub results: Vec<SearchResult>,

    /// Game-system schema text; empty when none was requested or found.
    pub schema_text: String,
}

impl RetrievedContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.schema_text.trim().is_empty()
    }

    pub fn schema(&self) -> Option<&str> {
        let schema = self.schema_text.trim();
        (!schema.is_empty()).then_some(schema)
    }
}

/// Builds a [`RetrievedContext`] from source content.
pub struct ContextBuilder {
    retrieval: Arc<dyn RetrievalAdapter>,
    schemas: Arc<dyn SchemaLoader>,
    config: RetrievalConfig,
}

impl ContextBuilder {
    /// Create a context builder over the given capabilities.
    pub fn new(
        retrieval: Arc<dyn RetrievalAdapter>,
        schemas: Arc<dyn SchemaLoader>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            retrieval,
            schemas,
            config,
        }
    }

    /// A builder with no search and no schemas; always yields an empty context.
    pub fn disabled() -> Self {
        Self::new(
            Arc::new(DisabledRetrieval),
            Arc::new(NoSchema),
            RetrievalConfig::default(),
        )
    }

    /// Build the context for `content`. Never fails: retrieval errors are
    /// logged and produce a partial or empty context.
    pub async fn build_context(
        &self,
        campaign_id: CampaignId,
        content: &str,
        schema_code: Option<&str>,
        entities: &[Entity],
        cancel: &CancellationToken,
    ) -> RetrievedContext {
        let mut context = RetrievedContext::new();

        // Step 1: Availability is checked once per build
        if self.retrieval.is_available() {
            // Step 2: Derive queries
            let queries = derive_queries(content, entities, &self.config);

            // Step 3: Run them
            let mut collected = Vec::new();
            for query in &queries {
                if cancel.is_cancelled() {
                    debug!(%campaign_id, "context build cancelled, keeping partial results");
                    break;
                }
                match self
                    .retrieval
                    .search(campaign_id, query, self.config.results_per_query, cancel)
                    .await
                {
                    Ok(results) => collected.extend(results),
                    Err(e) => warn!(%campaign_id, query = %query, error = %e, "context query failed"),
                }
            }

            // Step 4: Merge
            context.results = dedupe_and_trim(collected, &self.config);
            debug!(
                %campaign_id,
                queries = queries.len(),
                kept = context.results.len(),
                "retrieved context"
            );
        } else {
            debug!(%campaign_id, "semantic retrieval unavailable, skipping search");
        }

        // Step 5: Schema
        if let Some(code) = schema_code.map(str::trim).filter(|c| !c.is_empty()) {
            context.schema_text = self.schemas.load_schema(code).await;
        }

        context
    }
}

/// Derive the search queries for `content`.
///
/// The first query is the opening of the content plus the names of entities
/// it mentions; the rest are entity names in fixed-size batches so the number
/// of calls stays bounded. Empty queries are dropped.
pub fn derive_queries(content: &str, entities: &[Entity], config: &RetrievalConfig) -> Vec<String> {
    let mut queries = Vec::new();

    let opening: String = content.trim().chars().take(config.summary_query_chars).collect();
    let mentioned: Vec<&str> = entities
        .iter()
        .filter(|e| e.is_mentioned_in(content))
        .map(|e| e.name.trim())
        .collect();
    let mut summary = opening;
    for name in mentioned {
        summary.push(' ');
        summary.push_str(name);
    }
    queries.push(summary.trim().to_string());

    let names: Vec<&str> = entities
        .iter()
        .map(|e| e.name.trim())
        .filter(|n| !n.is_empty())
        .collect();
    for batch in names.chunks(config.entity_batch_size.max(1)) {
        queries.push(batch.join(" "));
    }

    queries.retain(|q| !q.is_empty());
    queries
}
