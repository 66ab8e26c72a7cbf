//! Retrieval seams: hybrid search, attribute schemas, and read-only access to
//! stored entities.
//!
//! All of these are external collaborators. Search and schema failures are
//! never fatal to a pipeline run; the context builder logs and moves on.

mod schema;

pub use schema::*;

use async_trait::async_trait;
use campaign_model::{CampaignId, Entity, EntityId, Relationship};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Errors from the search capability.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("search backend error: {0}")]
    Backend(String),

    #[error("search cancelled")]
    Cancelled,
}

/// Errors from the entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("entity not found: {0}")]
    NotFound(EntityId),
}

/// One ranked snippet returned by hybrid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source_table: String,
    pub source_id: String,
    pub source_name: String,
    pub chunk_content: String,
    /// Semantic similarity score.
    pub relevance_score: f64,
    /// Lexical + semantic fused score; the ranking key.
    pub combined_score: f64,
}

impl SearchResult {
    /// The key results are deduplicated on.
    pub fn source_key(&self) -> (&str, &str) {
        (&self.source_table, &self.source_id)
    }
}

/// Hybrid lexical + semantic search over campaign content.
#[async_trait]
pub trait RetrievalAdapter: Send + Sync {
    /// Whether semantic search is configured and reachable.
    fn is_available(&self) -> bool;

    async fn search(
        &self,
        campaign_id: CampaignId,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, RetrievalError>;
}

/// Retrieval that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRetrieval;

#[async_trait]
impl RetrievalAdapter for DisabledRetrieval {
    fn is_available(&self) -> bool {
        false
    }

    async fn search(
        &self,
        _campaign_id: CampaignId,
        _query: &str,
        _limit: usize,
        _cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        Ok(Vec::new())
    }
}

/// Read-only access to stored entities and their relationships.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list_entities(&self, campaign_id: CampaignId) -> Result<Vec<Entity>, StoreError>;

    async fn get_relationships(&self, entity_id: EntityId) -> Result<Vec<Relationship>, StoreError>;
}
