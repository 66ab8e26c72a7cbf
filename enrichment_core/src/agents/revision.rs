//! Content revision from accepted triage items.

use campaign_model::ContentAnalysisItem;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CompletionBudget;
use crate::error::{EnrichmentError, Result};
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::parser::parse_revision_response;
use crate::prompts::{revision_prompt, REVISION_SYSTEM_PROMPT};

/// A rewritten version of some content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionResult {
    pub revised_content: String,
    pub summary: String,
}

/// Rewrites content so it reflects accepted suggestions.
pub struct RevisionAgent {
    llm: Arc<dyn CompletionProvider>,
    budget: CompletionBudget,
}

impl RevisionAgent {
    /// Create a revision agent; `budget` is normally
    /// [`EnrichmentConfig::revision`](crate::config::EnrichmentConfig::revision).
    pub fn new(llm: Arc<dyn CompletionProvider>, budget: CompletionBudget) -> Self {
        Self { llm, budget }
    }

    /// Produce one revised version of `original_content`.
    ///
    /// With no accepted items the original is returned unchanged and no
    /// completion call is made. Output that is not the expected JSON is used
    /// verbatim as the revised content.
    pub async fn generate_revision(
        &self,
        original_content: &str,
        accepted_items: &[ContentAnalysisItem],
        schema_text: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RevisionResult> {
        if accepted_items.is_empty() {
            return Ok(RevisionResult {
                revised_content: original_content.to_string(),
                summary: String::new(),
            });
        }
        if cancel.is_cancelled() {
            return Err(EnrichmentError::Cancelled);
        }

        let request = CompletionRequest {
            system_prompt: REVISION_SYSTEM_PROMPT.to_string(),
            user_prompt: revision_prompt(original_content, accepted_items, schema_text),
            max_tokens: self.budget.max_tokens,
            temperature: self.budget.temperature,
        };
        let raw = self.llm.complete(&request, cancel).await?;
        let response = parse_revision_response(&raw);

        info!(items = accepted_items.len(), "content revised");
        Ok(RevisionResult {
            revised_content: response.revised_content,
            summary: response.summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnrichmentConfig;
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::LlmError;
    use campaign_model::{EntityId, LogEntry, SuggestionPayload};

    fn accepted_item() -> ContentAnalysisItem {
        let mut item = ContentAnalysisItem::suggestion(
            "Kael",
            None,
            SuggestionPayload::LogEntry(LogEntry {
                content: "Kael lost an eye".to_string(),
                occurred_at: None,
            }),
        );
        item.accept(EntityId::new()).unwrap();
        item
    }

    fn agent(provider: Arc<ScriptedProvider>) -> RevisionAgent {
        RevisionAgent::new(provider, EnrichmentConfig::default().revision)
    }

    #[tokio::test]
    async fn test_no_items_short_circuits() {
        let provider = Arc::new(ScriptedProvider::new().with_response("should not be used"));

        let result = agent(provider.clone())
            .generate_revision("Original text.", &[], None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            result,
            RevisionResult {
                revised_content: "Original text.".to_string(),
                summary: String::new(),
            }
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_revision_uses_revision_budget() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_response(r#"{"revisedContent": "Kael, one-eyed, left.", "summary": "Noted the eye"}"#),
        );

        let result = agent(provider.clone())
            .generate_revision("Kael left.", &[accepted_item()], Some("hp: int"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.revised_content, "Kael, one-eyed, left.");
        assert_eq!(result.summary, "Noted the eye");

        let config = EnrichmentConfig::default();
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, config.revision.max_tokens);
        assert_eq!(requests[0].temperature, config.revision.temperature);
        assert!(requests[0].user_prompt.contains("Suggestion: Kael lost an eye"));
        assert!(requests[0].user_prompt.contains("hp: int"));
    }

    #[tokio::test]
    async fn test_non_json_response_is_used_verbatim() {
        let provider = Arc::new(ScriptedProvider::new().with_response("\n Kael, one-eyed, left town. \n"));

        let result = agent(provider)
            .generate_revision("Kael left.", &[accepted_item()], None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.revised_content, "Kael, one-eyed, left town.");
        assert!(result.summary.is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new().with_error(LlmError::EmptyResponse));

        let err = agent(provider)
            .generate_revision("Kael left.", &[accepted_item()], None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichmentError::Llm(LlmError::EmptyResponse)));
    }
}
