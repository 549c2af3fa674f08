//! Streaming LLM providers and report streamers
//!
//! Two interchangeable ways of turning a prompt into a stream of text:
//! - [`RawDeltaStreamer`] reads raw response envelopes and pulls the nested
//!   text delta out of each one
//! - [`ChatAdapterStreamer`] drives a chat model and pipes its message chunks
//!   through [`StrOutputParser`]
//!
//! Both are backed by the same providers ([`BedrockProvider`], [`LiteLLMProvider`]).

mod bedrock;
mod chat;
mod envelope;
mod litellm;

pub use bedrock::BedrockProvider;
pub use chat::{ChatAdapterStreamer, ChatMessage, ChatModel, ChunkStream, MessageChunk, StrOutputParser};
pub use envelope::{extract_delta, EnvelopeSource, EnvelopeStream, RawDeltaStreamer};
pub use litellm::LiteLLMProvider;

use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when interacting with an LLM provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Provider returned error: {0}")]
    ProviderError(String),

    #[error("Stream interrupted: {0}")]
    StreamError(String),

    #[error("Invalid provider configuration: {0}")]
    ConfigError(String),
}

/// Lazy, single-pass sequence of decoded text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Turns a prompt into a text stream
#[async_trait]
pub trait ReportStreamer: Send + Sync {
    /// Human-readable description, e.g. "raw_delta via bedrock:us.amazon.nova-pro-v1:0"
    fn describe(&self) -> String;

    /// Send the prompt and start streaming the response
    async fn stream_report(&self, prompt: &str) -> Result<TextStream, ProviderError>;
}

/// Which invocation style drives the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStyle {
    /// Raw streaming call, nested delta extracted per envelope
    RawDelta,
    /// Chat abstraction composed with a string-output adapter
    ChatAdapter,
}

impl fmt::Display for StreamStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStyle::RawDelta => f.write_str("raw_delta"),
            StreamStyle::ChatAdapter => f.write_str("chat_adapter"),
        }
    }
}

impl FromStr for StreamStyle {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw_delta" | "raw" => Ok(StreamStyle::RawDelta),
            "chat_adapter" | "chat" => Ok(StreamStyle::ChatAdapter),
            other => Err(ProviderError::ConfigError(format!("unknown stream style '{}'", other))),
        }
    }
}

/// Hosted model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Bedrock,
    #[serde(rename = "litellm")]
    LiteLLM,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Bedrock => f.write_str("bedrock"),
            ProviderKind::LiteLLM => f.write_str("litellm"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bedrock" => Ok(ProviderKind::Bedrock),
            "litellm" => Ok(ProviderKind::LiteLLM),
            other => Err(ProviderError::ConfigError(format!("unknown provider '{}'", other))),
        }
    }
}

/// Wrap a backend that speaks both styles in the requested streamer
pub fn streamer_for<P>(provider: Arc<P>, style: StreamStyle) -> Arc<dyn ReportStreamer>
where
    P: EnvelopeSource + ChatModel + 'static,
{
    match style {
        StreamStyle::RawDelta => Arc::new(RawDeltaStreamer::new(provider)),
        StreamStyle::ChatAdapter => Arc::new(ChatAdapterStreamer::new(provider)),
    }
}

/// Build the configured streamer
pub async fn build_streamer(
    config: &crate::config::ModelConfig,
) -> Result<Arc<dyn ReportStreamer>, ProviderError> {
    let streamer = match config.provider {
        ProviderKind::Bedrock => {
            let provider = BedrockProvider::new(&config.model_id, config.region.as_deref()).await;
            streamer_for(Arc::new(provider), config.style)
        }
        ProviderKind::LiteLLM => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::ConfigError(
                    "LiteLLM provider configured but no API key found (set LITELLM_API_KEY or LITELLM_MASTER_KEY)"
                        .to_string(),
                )
            })?;
            let provider = LiteLLMProvider::with_base_url(&config.base_url, api_key, &config.model_id)?;
            streamer_for(Arc::new(provider), config.style)
        }
    };

    info!(streamer = %streamer.describe(), "Configured report streamer");
    Ok(streamer)
}
