//! OpenAI-compatible chat-completions client (Groq by default)

use super::{GenerationRequest, GenerationService};
use crate::chat::Role;
use crate::config::LlmConfig;
use crate::error::{ArchivistError, Result};
use crate::service::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const NO_CONTEXT: &str = "(no relevant context was retrieved)";

pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    /// Create a client from configuration
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`; an absent or empty key is a configuration error.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ArchivistError::MissingCredential {
                env: config.api_key_env.clone(),
            })?;

        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ArchivistError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Render a request as chat-completions messages
    ///
    /// The system message carries the policy, followed by a context block
    /// when the request has one; history turns follow in order, then the
    /// query as the final user turn.
    fn messages_to_json(request: &GenerationRequest) -> Vec<Value> {
        let system = match &request.context {
            None => request.system_policy.clone(),
            Some(passages) if passages.is_empty() => {
                format!("{}\n\nContext:\n{}", request.system_policy, NO_CONTEXT)
            }
            Some(passages) => {
                let block = passages
                    .iter()
                    .enumerate()
                    .map(|(i, passage)| format!("[{}] {}", i + 1, passage))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!("{}\n\nContext:\n{}", request.system_policy, block)
            }
        };

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(json!({ "role": "system", "content": system }));
        for turn in &request.history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.content }));
        }
        messages.push(json!({ "role": "user", "content": request.query }));
        messages
    }

    fn parse_response(json: &Value) -> std::result::Result<String, ServiceError> {
        json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ServiceError::Response("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl GenerationService for ChatCompletionsClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": Self::messages_to_json(request),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Request(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Response(format!("Invalid JSON: {}", e)))?;

        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatTurn;
    use crate::config::Config;
    use crate::evaluation::RELEVANCY_POLICY;

    #[test]
    fn test_missing_credential() {
        let mut config = Config::default().llm;
        config.api_key_env = "ARCHIVIST_TEST_UNSET_KEY_4711".to_string();
        let result = ChatCompletionsClient::from_config(&config);
        assert!(matches!(
            result,
            Err(ArchivistError::MissingCredential { env }) if env == "ARCHIVIST_TEST_UNSET_KEY_4711"
        ));
    }

    #[test]
    fn test_messages_layout() {
        let request = GenerationRequest::new("Answer from context.", "And the grass?")
            .with_context(vec!["The sky is blue.".to_string()])
            .with_history(vec![
                ChatTurn::user("What color is the sky?"),
                ChatTurn::assistant("Blue."),
            ]);

        let messages = ChatCompletionsClient::messages_to_json(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        let system = messages[0]["content"].as_str().unwrap();
        assert!(system.starts_with("Answer from context."));
        assert!(system.contains("[1] The sky is blue."));
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "And the grass?");
    }

    #[test]
    fn test_empty_context_is_explicit() {
        let request = GenerationRequest::new("policy", "q").with_context(Vec::new());
        let messages = ChatCompletionsClient::messages_to_json(&request);
        assert!(messages[0]["content"].as_str().unwrap().contains(NO_CONTEXT));
    }

    #[test]
    fn test_contextless_request_has_bare_policy() {
        let request = GenerationRequest::new(RELEVANCY_POLICY, "Question:\nwhy?");
        let messages = ChatCompletionsClient::messages_to_json(&request);
        assert_eq!(messages[0]["content"], RELEVANCY_POLICY);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_parse_response() {
        let json = json!({"choices": [{"message": {"content": "  The sky is blue. "}}]});
        assert_eq!(
            ChatCompletionsClient::parse_response(&json).unwrap(),
            "The sky is blue."
        );
        assert!(ChatCompletionsClient::parse_response(&json!({"choices": []})).is_err());
    }
}
