//! LiteLLM Proxy provider implementation
//!
//! Connects to a LiteLLM proxy (or any OpenAI-compatible endpoint) and reads
//! the `chat/completions` server-sent event stream.
//!
//! Configuration:
//! - base_url: LiteLLM proxy URL (default: http://localhost:4000)
//! - api_key: LITELLM_MASTER_KEY or LITELLM_API_KEY
//! - model: Model name as configured in LiteLLM (e.g., "nova-pro")

use super::chat::{ChatMessage, ChatModel, ChunkStream, MessageChunk};
use super::envelope::{EnvelopeSource, EnvelopeStream};
use super::ProviderError;
use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

const DONE_MARKER: &str = "[DONE]";

/// LiteLLM Proxy provider
pub struct LiteLLMProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LiteLLMProvider {
    /// Create a new LiteLLM provider with default URL (http://localhost:4000)
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url("http://localhost:4000", api_key, model)
    }

    /// Create with a custom base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client: Client::builder().build()?,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// POST a streaming chat request and return the raw `data:` payloads
    async fn open_sse(&self, messages: &[ChatMessage]) -> Result<EnvelopeStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let chat_request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        debug!(url = %url, model = %self.model, "LiteLLM streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&chat_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ProviderError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let model = self.model.clone();
        let mut events = Box::pin(response.bytes_stream().eventsource());

        let envelopes = try_stream! {
            let mut finished = false;
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| ProviderError::StreamError(e.to_string()))?;
                if event.data == DONE_MARKER {
                    finished = true;
                    break;
                }
                if event.data.is_empty() {
                    continue;
                }
                yield parse_payload(&event.data)?;
            }
            if !finished {
                warn!(model = %model, "LiteLLM stream closed before [DONE]");
                Err::<(), _>(ProviderError::StreamError(
                    "stream closed before [DONE]".to_string(),
                ))?;
            }
        };

        Ok(Box::pin(envelopes))
    }
}

fn parse_payload(data: &str) -> Result<Value, ProviderError> {
    let value: Value = serde_json::from_str(data)?;
    if let Some(error) = value.get("error") {
        return Err(ProviderError::ProviderError(error.to_string()));
    }
    Ok(value)
}

/// OpenAI-compatible chat request
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// OpenAI-compatible streaming chunk
#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

fn chunk_from_envelope(envelope: Value) -> Result<Option<MessageChunk>, ProviderError> {
    let chunk: ChatCompletionChunk = serde_json::from_value(envelope)?;

    let choice = chunk.choices.into_iter().next();
    let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
    let content = choice.and_then(|c| c.delta.content);

    Ok(match (content, finish_reason, chunk.usage) {
        (Some(text), _, _) => Some(MessageChunk::text(text)),
        (None, None, None) => None,
        (None, finish_reason, usage) => Some(MessageChunk::metadata(json!({
            "finish_reason": finish_reason,
            "usage": usage,
        }))),
    })
}

#[async_trait]
impl EnvelopeSource for LiteLLMProvider {
    fn name(&self) -> &str {
        "litellm"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn delta_pointer(&self) -> &'static str {
        "/choices/0/delta/content"
    }

    async fn open_envelopes(&self, prompt: &str) -> Result<EnvelopeStream, ProviderError> {
        self.open_sse(&[ChatMessage::user(prompt)]).await
    }
}

#[async_trait]
impl ChatModel for LiteLLMProvider {
    fn name(&self) -> &str {
        "litellm"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError> {
        let mut envelopes = self.open_sse(messages).await?;

        let chunks = try_stream! {
            while let Some(envelope) = envelopes.next().await {
                if let Some(chunk) = chunk_from_envelope(envelope?)? {
                    yield chunk;
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}
