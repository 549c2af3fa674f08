//! Amazon Bedrock provider
//!
//! Uses the Converse streaming API. AWS credentials and region come from the
//! standard credential chain (environment variables, shared config, IMDS).
//! The region can be pinned explicitly from configuration.

use super::chat::{ChatMessage, ChatModel, ChunkStream, MessageChunk};
use super::envelope::{EnvelopeSource, EnvelopeStream};
use super::ProviderError;
use async_stream::try_stream;
use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::operation::converse_stream::ConverseStreamOutput as ConverseStreamResponse;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ConversationRole, ConverseStreamOutput as StreamEvent,
    Message,
};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Bedrock provider for Converse-capable models (Nova, Claude, ...)
pub struct BedrockProvider {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
    region: String,
}

impl BedrockProvider {
    /// Create a provider, loading AWS configuration from the environment
    pub async fn new(model_id: impl Into<String>, region: Option<&str>) -> Self {
        let model_id = model_id.into();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unset".to_string());

        info!(model_id = %model_id, region = %region, "Bedrock client created");

        Self {
            client: aws_sdk_bedrockruntime::Client::new(&sdk_config),
            model_id,
            region,
        }
    }

    async fn converse_stream(
        &self,
        messages: Vec<Message>,
    ) -> Result<ConverseStreamResponse, ProviderError> {
        debug!(model_id = %self.model_id, messages = messages.len(), "Bedrock converse_stream");

        self.client
            .converse_stream()
            .model_id(&self.model_id)
            .set_messages(Some(messages))
            .send()
            .await
            .map_err(|e| {
                ProviderError::ProviderError(format!(
                    "Bedrock API error for region={}, model={}: {}",
                    self.region,
                    self.model_id,
                    DisplayErrorContext(&e)
                ))
            })
    }
}

fn to_bedrock_message(message: &ChatMessage) -> Result<Message, ProviderError> {
    let role = match message.role.as_str() {
        "assistant" => ConversationRole::Assistant,
        _ => ConversationRole::User,
    };

    Message::builder()
        .role(role)
        .content(ContentBlock::Text(message.content.clone()))
        .build()
        .map_err(|e| ProviderError::ProviderError(format!("Failed to build Bedrock message: {e}")))
}

/// Render one stream event in the Converse wire shape
fn event_to_envelope(event: &StreamEvent) -> Value {
    match event {
        StreamEvent::MessageStart(start) => json!({
            "messageStart": {"role": start.role.as_str()}
        }),
        StreamEvent::ContentBlockStart(start) => json!({
            "contentBlockStart": {"contentBlockIndex": start.content_block_index}
        }),
        StreamEvent::ContentBlockDelta(delta_event) => {
            let delta = match &delta_event.delta {
                Some(ContentBlockDelta::Text(text)) => json!({"text": text}),
                Some(ContentBlockDelta::ToolUse(tool)) => json!({"toolUse": {"input": tool.input}}),
                _ => json!({}),
            };
            json!({
                "contentBlockDelta": {
                    "contentBlockIndex": delta_event.content_block_index,
                    "delta": delta,
                }
            })
        }
        StreamEvent::ContentBlockStop(stop) => json!({
            "contentBlockStop": {"contentBlockIndex": stop.content_block_index}
        }),
        StreamEvent::MessageStop(stop) => json!({
            "messageStop": {"stopReason": stop.stop_reason.as_str()}
        }),
        StreamEvent::Metadata(metadata) => {
            let usage = metadata.usage.as_ref().map(|u| {
                json!({
                    "inputTokens": u.input_tokens,
                    "outputTokens": u.output_tokens,
                    "totalTokens": u.total_tokens,
                })
            });
            json!({"metadata": {"usage": usage}})
        }
        _ => json!({}),
    }
}

/// Map one stream event to a chat chunk; events without text or metadata map to nothing
fn event_to_chunk(event: &StreamEvent) -> Option<MessageChunk> {
    match event {
        StreamEvent::ContentBlockDelta(delta_event) => match &delta_event.delta {
            Some(ContentBlockDelta::Text(text)) => Some(MessageChunk::text(text.clone())),
            _ => None,
        },
        StreamEvent::MessageStop(stop) => Some(MessageChunk::metadata(json!({
            "stopReason": stop.stop_reason.as_str()
        }))),
        StreamEvent::Metadata(_) => Some(MessageChunk::metadata(event_to_envelope(event)["metadata"].clone())),
        _ => None,
    }
}

#[async_trait]
impl EnvelopeSource for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    fn delta_pointer(&self) -> &'static str {
        "/contentBlockDelta/delta/text"
    }

    async fn open_envelopes(&self, prompt: &str) -> Result<EnvelopeStream, ProviderError> {
        let message = to_bedrock_message(&ChatMessage::user(prompt))?;
        let mut response = self.converse_stream(vec![message]).await?;

        let envelopes = try_stream! {
            while let Some(event) = response
                .stream
                .recv()
                .await
                .map_err(|e| ProviderError::StreamError(DisplayErrorContext(&e).to_string()))?
            {
                yield event_to_envelope(&event);
            }
        };

        Ok(Box::pin(envelopes))
    }
}

#[async_trait]
impl ChatModel for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError> {
        let messages = messages
            .iter()
            .map(to_bedrock_message)
            .collect::<Result<Vec<_>, _>>()?;
        let mut response = self.converse_stream(messages).await?;

        let chunks = try_stream! {
            while let Some(event) = response
                .stream
                .recv()
                .await
                .map_err(|e| ProviderError::StreamError(DisplayErrorContext(&e).to_string()))?
            {
                if let Some(chunk) = event_to_chunk(&event) {
                    yield chunk;
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}
