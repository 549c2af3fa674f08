//! Raw-delta streaming: read response envelopes, extract the nested text field

use super::{ProviderError, ReportStreamer, TextStream};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Raw response envelopes, in arrival order
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Result<Value, ProviderError>> + Send>>;

/// A backend that exposes its streaming response as raw JSON envelopes
#[async_trait]
pub trait EnvelopeSource: Send + Sync {
    /// Get the provider name for logging/identification
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;

    /// JSON pointer to the text delta inside one envelope
    fn delta_pointer(&self) -> &'static str;

    /// Issue the streaming call for a single user message
    async fn open_envelopes(&self, prompt: &str) -> Result<EnvelopeStream, ProviderError>;
}

/// Pull the text delta out of an envelope, if it has one.
///
/// Envelopes that do not carry a string at `pointer` (message start/stop,
/// usage metadata, tool-use deltas) yield `None`.
pub fn extract_delta(envelope: &Value, pointer: &str) -> Option<String> {
    envelope.pointer(pointer)?.as_str().map(str::to_string)
}

/// Streams text by extracting the delta from each raw envelope
pub struct RawDeltaStreamer {
    source: Arc<dyn EnvelopeSource>,
}

impl RawDeltaStreamer {
    pub fn new(source: Arc<dyn EnvelopeSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ReportStreamer for RawDeltaStreamer {
    fn describe(&self) -> String {
        format!("raw_delta via {}:{}", self.source.name(), self.source.model())
    }

    async fn stream_report(&self, prompt: &str) -> Result<TextStream, ProviderError> {
        let mut envelopes = self.source.open_envelopes(prompt).await?;
        let pointer = self.source.delta_pointer();

        let text = try_stream! {
            let mut skipped = 0usize;
            let mut yielded = 0usize;

            while let Some(envelope) = envelopes.next().await {
                let envelope = envelope?;
                match extract_delta(&envelope, pointer) {
                    Some(delta) => {
                        yielded += 1;
                        yield delta;
                    }
                    None => skipped += 1,
                }
            }

            debug!(yielded, skipped, pointer, "Envelope stream finished");
        };

        Ok(Box::pin(text))
    }
}
