//! Model client boundary.
//!
//! The runner talks to the model through one operation,
//! [`ModelClient::evaluate`], taking role-tagged [`Message`]s whose content is
//! either plain text or a list of typed [`ContentBlock`]s. The message types
//! serialise to the OpenAI chat-completions shape, so a request can be
//! logged or inspected exactly as it would go over the wire.
//!
//! [`ProviderClient`] is the production implementation: it translates the
//! messages into `edgequake-llm` chat messages and works with every provider
//! that crate supports (OpenAI, Anthropic, Gemini, Azure, Ollama, …). Tests
//! implement [`ModelClient`] directly with deterministic doubles.

use crate::config::BenchmarkConfig;
use crate::error::{BenchError, ModelError};
use crate::output::TokenUsage;
use crate::pipeline::encode::split_data_uri;
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LLMResponse, ProviderFactory,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

// ── Messages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Resolution hint for an image block.
///
/// `High` lets GPT-4-class models tile the image at full resolution; at
/// `Low` a 9 px font is unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

impl ImageDetail {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageDetail::Low => "low",
            ImageDetail::High => "high",
            ImageDetail::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// A `data:<mime>;base64,…` URI.
    pub url: String,
    pub detail: ImageDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentBlock {
    pub fn image(url: impl Into<String>, detail: ImageDetail) -> Self {
        ContentBlock::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// The plain-text content, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            MessageContent::Blocks(_) => None,
        }
    }
}

/// Generated text plus the provider's token accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

// ── Client trait ─────────────────────────────────────────────────────────

/// A remote model that answers a message sequence.
///
/// Implementations must be `Send + Sync`: one client is shared by every
/// worker of a run.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier recorded in the report.
    fn model_id(&self) -> &str;

    /// Submit `messages` and wait for the completion.
    async fn evaluate(&self, messages: &[Message]) -> Result<Completion, ModelError>;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// [`ModelClient`] backed by an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            options: CompletionOptions::default(),
        }
    }

    /// Apply sampling overrides; `None` keeps the provider default.
    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<usize>) -> Self {
        self.options = CompletionOptions {
            temperature,
            max_tokens,
            ..Default::default()
        };
        self
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn evaluate(&self, messages: &[Message]) -> Result<Completion, ModelError> {
        let chat: Vec<ChatMessage> = messages
            .iter()
            .map(to_chat_message)
            .collect::<Result<_, _>>()?;

        let response = self
            .provider
            .chat(&chat, Some(&self.options))
            .await
            .map_err(|e| ModelError::Api {
                message: e.to_string(),
            })?;

        if response.content.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        Ok(Completion {
            usage: usage_of(&response),
            text: response.content,
        })
    }
}

/// Token counts as reported by the provider. The total is taken verbatim;
/// it can exceed prompt + completion when reasoning tokens are billed.
fn usage_of(response: &LLMResponse) -> TokenUsage {
    TokenUsage {
        prompt_tokens: response.prompt_tokens as u64,
        completion_tokens: response.completion_tokens as u64,
        total_tokens: response.total_tokens as u64,
    }
}

/// Translate one message into the provider crate's representation.
///
/// Text blocks inside a block list are joined with newlines; image blocks
/// must be base64 data URIs.
fn to_chat_message(msg: &Message) -> Result<ChatMessage, ModelError> {
    match (&msg.role, &msg.content) {
        (Role::System, MessageContent::Text(text)) => Ok(ChatMessage::system(text)),
        (Role::User, MessageContent::Text(text)) => Ok(ChatMessage::user(text)),
        (role, MessageContent::Blocks(blocks)) => {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => texts.push(text.as_str()),
                    ContentBlock::ImageUrl { image_url } => {
                        let (mime, payload) = split_data_uri(&image_url.url).ok_or_else(|| {
                            ModelError::InvalidMessage(
                                "image blocks must carry a base64 data URI".into(),
                            )
                        })?;
                        images.push(
                            ImageData::new(payload.to_string(), mime)
                                .with_detail(image_url.detail.as_str()),
                        );
                    }
                }
            }
            let text = texts.join("\n");
            match role {
                Role::User => Ok(ChatMessage::user_with_images(&text, images)),
                Role::System if images.is_empty() => Ok(ChatMessage::system(&text)),
                Role::System => Err(ModelError::InvalidMessage(
                    "system messages cannot carry images".into(),
                )),
            }
        }
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Injected client** (`config.client`) — used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model_id()`.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY`** present → OpenAI with `config.model_id()`.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_client(config: &BenchmarkConfig) -> Result<Arc<dyn ModelClient>, BenchError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let wrap = |provider: Arc<dyn LLMProvider>, model: &str| -> Arc<dyn ModelClient> {
        Arc::new(
            ProviderClient::new(provider, model)
                .with_sampling(config.temperature, config.max_tokens),
        )
    };

    if let Some(ref name) = config.provider_name {
        let model = config.model_id();
        return create_provider(name, model).map(|p| wrap(p, model));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(|p| wrap(p, &model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model_id();
            return create_provider("openai", model).map(|p| wrap(p, model));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| BenchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    debug!("Auto-detected LLM provider from environment");
    Ok(wrap(llm_provider, config.model_id()))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, BenchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        BenchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_keeps_the_provider_total() {
        let mut response = LLMResponse::new("answer", "gpt-4.1-mini").with_usage(900, 40);
        response.total_tokens = 1000;
        let usage = usage_of(&response);
        assert_eq!(usage.prompt_tokens, 900);
        assert_eq!(usage.completion_tokens, 40);
        assert_eq!(usage.total_tokens, 1000);
    }

    #[test]
    fn image_message_matches_chat_completions_shape() {
        let msg = Message::user_blocks(vec![ContentBlock::image(
            "data:image/jpeg;base64,AAAA",
            ImageDetail::High,
        )]);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [{
                    "type": "image_url",
                    "image_url": { "url": "data:image/jpeg;base64,AAAA", "detail": "high" }
                }]
            })
        );
    }

    #[test]
    fn text_message_is_a_plain_string() {
        let msg = Message::system("Answer from the document.");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "role": "system", "content": "Answer from the document." })
        );
        assert_eq!(msg.text(), Some("Answer from the document."));
    }

    #[test]
    fn non_data_uri_images_are_rejected() {
        let msg = Message::user_blocks(vec![ContentBlock::image(
            "https://example.com/page1.jpg",
            ImageDetail::High,
        )]);
        let err = to_chat_message(&msg).unwrap_err();
        assert!(matches!(err, ModelError::InvalidMessage(_)));
    }

    #[test]
    fn system_images_are_rejected() {
        let msg = Message {
            role: Role::System,
            content: MessageContent::Blocks(vec![ContentBlock::image(
                "data:image/png;base64,AAAA",
                ImageDetail::Low,
            )]),
        };
        assert!(to_chat_message(&msg).is_err());
    }

    #[test]
    fn data_uri_images_translate() {
        let msg = Message::user_blocks(vec![
            ContentBlock::Text {
                text: "context".into(),
            },
            ContentBlock::image("data:image/png;base64,AAAA", ImageDetail::High),
        ]);
        assert!(to_chat_message(&msg).is_ok());
    }

    #[test]
    fn injected_client_wins() {
        struct Fixed;

        #[async_trait]
        impl ModelClient for Fixed {
            fn model_id(&self) -> &str {
                "fixed"
            }
            async fn evaluate(&self, _: &[Message]) -> Result<Completion, ModelError> {
                Err(ModelError::EmptyResponse)
            }
        }

        let config = BenchmarkConfig::builder()
            .client(Arc::new(Fixed))
            .provider_name("openai")
            .build()
            .unwrap();
        let client = resolve_client(&config).unwrap();
        assert_eq!(client.model_id(), "fixed");
    }
}
