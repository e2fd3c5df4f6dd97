//! Model interaction: the [`ChatModel`] seam and its edgequake-llm backing.
//!
//! Everything above this module talks to models through [`ChatModel`], a
//! single `chat(turns) -> text` capability. The production implementation
//! wraps an `edgequake_llm::LLMProvider`; tests substitute scripted models.

use crate::error::{DigestError, GistError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, OllamaProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Who wrote a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A model that answers a conversation with text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, used in logs and errors.
    fn name(&self) -> &str;

    /// Send `turns` and return the reply text.
    async fn chat(&self, turns: &[Turn]) -> Result<String, GistError>;
}

/// A [`ChatModel`] backed by an edgequake-llm provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
}

impl ProviderModel {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        temperature: Option<f32>,
        max_tokens: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            options: CompletionOptions {
                temperature,
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl ChatModel for ProviderModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, turns: &[Turn]) -> Result<String, GistError> {
        let start = Instant::now();
        let messages: Vec<ChatMessage> = turns.iter().map(to_chat_message).collect();

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| GistError::ModelCallFailed {
                model: self.model.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.model,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

fn to_chat_message(turn: &Turn) -> ChatMessage {
    match turn.role {
        Role::System => ChatMessage::system(turn.content.as_str()),
        Role::User => ChatMessage::user(turn.content.as_str()),
        Role::Assistant => ChatMessage::assistant(turn.content.as_str()),
    }
}

/// Instantiate a named provider for `model`.
///
/// Ollama is built against `ollama_base_url` directly; other providers take
/// their credentials from the environment.
pub fn create_provider(
    provider_name: &str,
    model: &str,
    ollama_base_url: &str,
) -> Result<Arc<dyn LLMProvider>, DigestError> {
    let not_configured = |e: edgequake_llm::LlmError| DigestError::ProviderNotConfigured {
        provider: provider_name.to_string(),
        hint: format!("{e}"),
    };
    if provider_name.eq_ignore_ascii_case("ollama") {
        let provider = OllamaProvider::builder()
            .host(ollama_base_url.trim_end_matches('/'))
            .model(model)
            .build()
            .map_err(not_configured)?;
        return Ok(Arc::new(provider));
    }
    ProviderFactory::create_llm_provider(provider_name, model).map_err(not_configured)
}

/// Build a [`ProviderModel`] for `model` on the named provider.
pub fn provider_model(
    provider_name: &str,
    model: &str,
    ollama_base_url: &str,
    temperature: Option<f32>,
    max_tokens: usize,
) -> Result<Arc<dyn ChatModel>, DigestError> {
    let provider = create_provider(provider_name, model, ollama_base_url)?;
    Ok(Arc::new(ProviderModel::new(
        provider,
        model,
        temperature,
        max_tokens,
    )))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;

    #[test]
    fn turn_constructors_set_roles() {
        assert_eq!(Turn::system("s").role, Role::System);
        assert_eq!(Turn::user("u").role, Role::User);
        assert_eq!(Turn::assistant("a").content, "a");
    }

    #[tokio::test]
    async fn ollama_provider_uses_configured_base_url() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"model": "tiny"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model": "tiny", "message": {"role": "assistant", "content": "pong"}, "done": true}"#,
            )
            .create_async()
            .await;

        let model = provider_model("ollama", "tiny", &format!("{}/", server.url()), Some(0.0), 64).unwrap();
        let reply = model.chat(&[Turn::user("ping")]).await.unwrap();
        assert_eq!(reply, "pong");
        m.assert_async().await;
    }

    #[test]
    fn unknown_provider_is_not_configured() {
        let err = create_provider("no-such-provider", "m", "http://127.0.0.1:11434")
            .err()
            .unwrap();
        assert!(matches!(err, DigestError::ProviderNotConfigured { .. }));
    }

    #[tokio::test]
    async fn scripted_model_records_calls() {
        let model = ScriptedModel::ok("m", &["first"]);
        let reply = model.chat(&[Turn::user("hi")]).await.unwrap();
        assert_eq!(reply, "first");
        assert!(model.chat(&[Turn::user("again")]).await.is_err());
        assert_eq!(model.call_count(), 2);
    }
}
