//! Error types for the enrichment pipeline.
//!
//! Malformed model output is deliberately absent: the response parser absorbs
//! it and degrades to an empty result.

pub use crate::config::ConfigError;
pub use crate::llm::LlmError;
pub use crate::pipeline::PipelineConfigError;
pub use crate::retrieval::{RetrievalError, StoreError};

/// Alias for Results returning [`EnrichmentError`].
pub type Result<T> = std::result::Result<T, EnrichmentError>;

/// Errors surfaced by a single agent invocation.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// The caller passed an entity or content the agent cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("completion failed: {0}")]
    Llm(#[from] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("store read failed: {0}")]
    Store(#[from] StoreError),

    #[error("cancelled")]
    Cancelled,
}
