//! Tunables for retrieval, prompting and completion calls, loadable from TOML.
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```toml
//! [retrieval]
//! token_budget = 3000
//!
//! [revision]
//! temperature = 0.4
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Context retrieval limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum results requested per search query.
    pub results_per_query: usize,

    /// Token budget for the combined retrieved snippets.
    pub token_budget: usize,

    /// Estimated tokens per character of snippet text.
    pub tokens_per_char: f64,

    /// Characters of content used for the summary query.
    pub summary_query_chars: usize,

    /// Entity names per batched name query.
    pub entity_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            results_per_query: 10,
            token_budget: 4000,
            tokens_per_char: 0.25,
            summary_query_chars: 150,
            entity_batch_size: 5,
        }
    }
}

/// Prompt rendering limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Maximum characters of source content embedded in a prompt.
    pub content_char_budget: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            content_char_budget: 4000,
        }
    }
}

/// Budget for one kind of completion call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionBudget {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionBudget {
    fn enrichment() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    fn revision() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.5,
        }
    }
}

/// A budget table as written in TOML; absent keys keep the section default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BudgetOverride {
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl BudgetOverride {
    fn apply(self, base: CompletionBudget) -> CompletionBudget {
        CompletionBudget {
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            temperature: self.temperature.unwrap_or(base.temperature),
        }
    }
}

fn enrichment_budget<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CompletionBudget, D::Error> {
    Ok(BudgetOverride::deserialize(deserializer)?.apply(CompletionBudget::enrichment()))
}

fn revision_budget<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CompletionBudget, D::Error> {
    Ok(BudgetOverride::deserialize(deserializer)?.apply(CompletionBudget::revision()))
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    /// Used by entity enrichment and new-entity detection.
    #[serde(deserialize_with = "enrichment_budget")]
    pub enrichment: CompletionBudget,
    /// Used by content revision; tuned independently.
    #[serde(deserialize_with = "revision_budget")]
    pub revision: CompletionBudget,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            enrichment: CompletionBudget::enrichment(),
            revision: CompletionBudget::revision(),
        }
    }
}

impl EnrichmentConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
