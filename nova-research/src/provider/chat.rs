//! Chat-adapter streaming: a chat model composed with a string-output parser

use super::{ProviderError, ReportStreamer, TextStream};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;

/// One message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A piece of the assistant's message as it streams in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageChunk {
    /// Text carried by this chunk (may be empty)
    pub content: String,
    /// Provider-specific extras such as stop reason or token usage
    pub metadata: Option<Value>,
}

impl MessageChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn metadata(metadata: Value) -> Self {
        Self {
            content: String::new(),
            metadata: Some(metadata),
        }
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<MessageChunk, ProviderError>> + Send>>;

/// Higher-level chat interface over a hosted model
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Stream the assistant's reply to `messages`
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError>;
}

/// Adapter that reduces message chunks to their plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

impl StrOutputParser {
    pub fn parse(&self, chunks: ChunkStream) -> TextStream {
        Box::pin(chunks.map(|chunk| chunk.map(|c| c.content)))
    }
}

/// Streams text through a chat model and [`StrOutputParser`]
pub struct ChatAdapterStreamer {
    model: Arc<dyn ChatModel>,
    parser: StrOutputParser,
}

impl ChatAdapterStreamer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            parser: StrOutputParser,
        }
    }
}

#[async_trait]
impl ReportStreamer for ChatAdapterStreamer {
    fn describe(&self) -> String {
        format!("chat_adapter via {}:{}", self.model.name(), self.model.model())
    }

    async fn stream_report(&self, prompt: &str) -> Result<TextStream, ProviderError> {
        let chunks = self.model.stream_chat(&[ChatMessage::user(prompt)]).await?;
        Ok(self.parser.parse(chunks))
    }
}
