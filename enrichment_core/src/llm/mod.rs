//! Text-generation capability.
//!
//! The provider is external; the pipeline only needs "system + user prompt in,
//! text out". Implementations own their own timeouts and retries.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Errors from a completion call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("empty response from provider")]
    EmptyResponse,

    #[error("completion cancelled")]
    Cancelled,
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A text-generation backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion. Implementations should stop early when `cancel`
    /// fires and return [`LlmError::Cancelled`].
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider for unit tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses in order and records every request.
    #[derive(Default)]
    pub struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, text: impl Into<String>) -> Self {
            self.responses.lock().unwrap().push_back(Ok(text.into()));
            self
        }

        pub fn with_error(self, error: LlmError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: &CompletionRequest,
            _cancel: &CancellationToken,
        ) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }
}
