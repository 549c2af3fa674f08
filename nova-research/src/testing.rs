//! Test doubles shared across module tests

use crate::logs::{LogEvent, LogSink};
use crate::provider::{
    ChatMessage, ChatModel, ChunkStream, EnvelopeSource, EnvelopeStream, MessageChunk,
    ProviderError, TextStream,
};
use crate::research::{ResearchBundle, ResearchError, Researcher};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Mutex;

/// Collects every accepted event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<LogEvent>,
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn accept(&mut self, event: LogEvent) {
        self.events.push(event);
    }
}

/// Drain a text stream, stopping at the first error
pub async fn collect_text(mut stream: TextStream) -> Result<Vec<String>, ProviderError> {
    let mut out = Vec::new();
    while let Some(fragment) = stream.next().await {
        out.push(fragment?);
    }
    Ok(out)
}

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_router(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Researcher that replays fixed log events and returns a fixed bundle
pub struct StaticResearcher {
    outcome: Result<ResearchBundle, String>,
    events: Vec<Value>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticResearcher {
    pub fn new(bundle: ResearchBundle, events: Vec<Value>) -> Self {
        Self {
            outcome: Ok(bundle),
            events,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            events: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Researcher for StaticResearcher {
    fn name(&self) -> &str {
        "static"
    }

    async fn conduct_research(
        &self,
        query: &str,
        report_type: &str,
        sink: &mut dyn LogSink,
    ) -> Result<ResearchBundle, ResearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), report_type.to_string()));
        for event in &self.events {
            sink.accept(LogEvent::new(event.clone())).await;
        }
        self.outcome.clone().map_err(ResearchError::Service)
    }
}

/// Envelope source replaying a fixed script
pub struct ScriptedEnvelopes {
    envelopes: Vec<Value>,
    pointer: &'static str,
    fail_at_end: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEnvelopes {
    /// Envelopes shaped like Bedrock Converse stream events
    pub fn bedrock(envelopes: Vec<Value>) -> Self {
        Self {
            envelopes,
            pointer: "/contentBlockDelta/delta/text",
            fail_at_end: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Emit a stream error after the scripted envelopes
    pub fn fail_after(mut self) -> Self {
        self.fail_at_end = true;
        self
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl EnvelopeSource for ScriptedEnvelopes {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    fn delta_pointer(&self) -> &'static str {
        self.pointer
    }

    async fn open_envelopes(&self, prompt: &str) -> Result<EnvelopeStream, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut items: Vec<Result<Value, ProviderError>> =
            self.envelopes.iter().cloned().map(Ok).collect();
        if self.fail_at_end {
            items.push(Err(ProviderError::StreamError("connection reset".to_string())));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Chat model replaying fixed chunks
pub struct ScriptedChat {
    chunks: Vec<MessageChunk>,
    received: Mutex<Vec<ChatMessage>>,
}

impl ScriptedChat {
    pub fn new(chunks: Vec<MessageChunk>) -> Self {
        Self {
            chunks,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<ChatMessage> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted-chat"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError> {
        self.received.lock().unwrap().extend_from_slice(messages);
        let items: Vec<Result<MessageChunk, ProviderError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
