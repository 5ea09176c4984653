//! Generation service contract and the chat-completions client
//!
//! Condensation, answer generation and both evaluation judgments are all
//! single calls to a [`GenerationService`] with a different system policy.

mod client;

pub use client::ChatCompletionsClient;

use crate::chat::ChatTurn;
use crate::service::ServiceError;
use async_trait::async_trait;

/// One call to the generation service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub system_policy: String,
    /// Passages the reply must be grounded in; `None` for calls that take no
    /// context, `Some(empty)` when retrieval found nothing
    pub context: Option<Vec<String>>,
    pub history: Vec<ChatTurn>,
    pub query: String,
}

impl GenerationRequest {
    pub fn new(system_policy: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            system_policy: system_policy.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn passages(&self) -> &[String] {
        self.context.as_deref().unwrap_or_default()
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;

    fn model_name(&self) -> &str;
}
