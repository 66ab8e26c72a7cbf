//! # Enrichment Core
//!
//! Turns a piece of campaign prose into reviewable suggestions. Content goes
//! through a multi-stage pipeline of agents that call a language model, with
//! supporting context gathered from hybrid search and game-system schemas.
//! Every suggestion comes out as a pending triage item; accepted items can
//! later be folded back into the prose by the revision agent.
//!
//! ## Core Components
//!
//! - **context_builder**: Gathers retrieved snippets and schema text under a token budget
//! - **prompts**: Renders system and user prompts
//! - **parser**: Tolerant decoding of model output
//! - **agents**: Entity enrichment, new-entity detection and revision
//! - **pipeline**: Stage ordering, dependency sorting and failure isolation
//! - **retrieval** / **llm**: Seams to the search, schema, store and completion backends
//!
//! ## Failure Model
//!
//! - Malformed model output degrades to "no suggestions", never an error
//! - A failing agent loses only its own contribution
//! - Retrieval is best-effort; a run without context still works

pub mod agents;
pub mod config;
pub mod context_builder;
pub mod error;
pub mod llm;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;

pub use agents::*;
pub use config::*;
pub use context_builder::*;
pub use error::{EnrichmentError, Result};
pub use llm::{CompletionProvider, CompletionRequest, LlmError};
pub use pipeline::*;
pub use retrieval::{
    is_valid_schema_code, DisabledRetrieval, EntityStore, FsSchemaLoader, NoSchema, RetrievalAdapter,
    RetrievalError, SchemaLoader, SearchResult, StoreError,
};
