//! Report pipeline: research, prompt, stream
//!
//! One call to [`ReportPipeline::run`] is one request cycle. Progress is
//! reported to the UI shell as [`ShellEvent`]s over an unbounded channel.

use crate::logs::{ChannelPanel, LogCollector, LogEntry, LogSink};
use crate::prompt::{prompt_for_report_type, PromptError, PromptOptions};
use crate::provider::{ProviderError, ReportStreamer};
use crate::research::{ResearchBundle, ResearchError, Researcher};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Errors from a request cycle
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Research failed: {0}")]
    Research(#[from] ResearchError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("UI shell went away during generation")]
    Detached,
}

/// Stage of the request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Researching,
    Generating,
    Done,
}

/// Progress reported to the UI shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    Phase(Phase),
    Log(LogEntry),
    Chunk(String),
    Panels(ResearchBundle),
    Error(String),
}

/// A request as typed in by the user
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub query: String,
    pub report_type: String,
}

impl ReportRequest {
    pub fn new(query: impl Into<String>, report_type: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            report_type: report_type.into(),
        }
    }
}

/// Result of a completed cycle
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    /// Concatenation of every streamed fragment
    pub report: String,
    pub bundle: ResearchBundle,
    pub log_count: usize,
}

/// Wires the research service, prompt templates and the model stream together
pub struct ReportPipeline {
    researcher: Arc<dyn Researcher>,
    streamer: Arc<dyn ReportStreamer>,
    options: PromptOptions,
}

impl ReportPipeline {
    /// Create a new pipeline
    pub fn new(
        researcher: Arc<dyn Researcher>,
        streamer: Arc<dyn ReportStreamer>,
        options: PromptOptions,
    ) -> Self {
        Self {
            researcher,
            streamer,
            options,
        }
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// Description of the configured backends, for health output
    pub fn describe(&self) -> String {
        format!(
            "research via {}, {}",
            self.researcher.name(),
            self.streamer.describe()
        )
    }

    /// Research a query, forwarding log events to `sink` until the bundle is ready
    pub async fn request_report(
        &self,
        query: &str,
        report_type: &str,
        sink: &mut dyn LogSink,
    ) -> Result<ResearchBundle, PipelineError> {
        Ok(self
            .researcher
            .conduct_research(query, report_type, sink)
            .await?)
    }

    /// Run one full cycle
    pub async fn run(
        &self,
        request: &ReportRequest,
        events: UnboundedSender<ShellEvent>,
    ) -> Result<ReportOutcome, PipelineError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        // Fail on an unknown report type before spending anything on research
        let template = prompt_for_report_type(&request.report_type)?;

        info!(query, report_type = %request.report_type, "Starting report cycle");
        let _ = events.send(ShellEvent::Phase(Phase::Researching));

        let mut collector = LogCollector::new(ChannelPanel::new(events.clone()));
        let bundle = self
            .request_report(query, &request.report_type, &mut collector)
            .await?;
        let log_count = collector.len();

        let prompt = template.build(query, &bundle.context, &bundle.sources, &self.options);
        debug!(prompt_len = prompt.len(), log_count, "Prompt built");

        let _ = events.send(ShellEvent::Phase(Phase::Generating));
        let mut stream = self.streamer.stream_report(&prompt).await?;

        let mut report = String::new();
        let mut chunks = 0usize;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            report.push_str(&fragment);
            chunks += 1;
            if events.send(ShellEvent::Chunk(fragment)).is_err() {
                warn!(chunks, "UI shell closed mid-stream, dropping model stream");
                return Err(PipelineError::Detached);
            }
        }

        info!(chunks, report_len = report.len(), "Report generated");

        let _ = events.send(ShellEvent::Panels(bundle.clone()));
        let _ = events.send(ShellEvent::Phase(Phase::Done));

        Ok(ReportOutcome {
            report,
            bundle,
            log_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatAdapterStreamer, MessageChunk, RawDeltaStreamer};
    use crate::research::Source;
    use crate::testing::{RecordingSink, ScriptedChat, ScriptedEnvelopes, StaticResearcher};
    use serde_json::json;
    use tokio::sync::mpsc;

    const QUERY: &str = "impact of tariffs on steel prices";

    fn bundle() -> ResearchBundle {
        ResearchBundle {
            context: "Tariffs of 25% were applied to imported steel.".to_string(),
            costs: 0.0132,
            images: vec!["https://img.example/steel.png".to_string()],
            sources: vec![Source::new("https://example.com/steel")],
        }
    }

    fn researcher() -> Arc<StaticResearcher> {
        Arc::new(StaticResearcher::new(
            bundle(),
            vec![
                json!({"type": "logs", "content": "starting_research"}),
                json!({"type": "logs", "output": "scraping"}),
            ],
        ))
    }

    fn three_chunk_envelopes() -> ScriptedEnvelopes {
        ScriptedEnvelopes::bedrock(vec![
            json!({"messageStart": {"role": "assistant"}}),
            json!({"contentBlockDelta": {"delta": {"text": "The "}}}),
            json!({"contentBlockDelta": {"delta": {"text": "impact "}}}),
            json!({"contentBlockDelta": {"delta": {"text": "is significant."}}}),
            json!({"messageStop": {"stopReason": "end_turn"}}),
        ])
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ShellEvent>) -> Vec<ShellEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_end_to_end_raw_delta() {
        let researcher = researcher();
        let envelopes = Arc::new(three_chunk_envelopes());
        let pipeline = ReportPipeline::new(
            researcher.clone(),
            Arc::new(RawDeltaStreamer::new(envelopes.clone())),
            PromptOptions::default(),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = pipeline
            .run(&ReportRequest::new(QUERY, "research_report"), tx)
            .await
            .unwrap();

        assert_eq!(outcome.report, "The impact is significant.");
        assert_eq!(outcome.log_count, 2);
        assert_eq!(outcome.bundle, bundle());

        // The research step saw the query and report type unchanged
        assert_eq!(researcher.calls(), vec![(QUERY.to_string(), "research_report".to_string())]);

        // The prompt handed to the model carries the query and context
        let prompt = envelopes.last_prompt().unwrap();
        assert!(prompt.contains(QUERY));
        assert!(prompt.contains("Tariffs of 25%"));
        assert!(prompt.contains("https://example.com/steel"));

        let events = drain(&mut rx);
        let chunks: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ShellEvent::Chunk(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec!["The ", "impact ", "is significant."]);

        assert_eq!(events.first(), Some(&ShellEvent::Phase(Phase::Researching)));
        assert_eq!(events.last(), Some(&ShellEvent::Phase(Phase::Done)));
        assert!(matches!(&events[1], ShellEvent::Log(entry) if entry.label == "starting_research"));
        assert!(matches!(&events[2], ShellEvent::Log(entry) if entry.label == "Log..."));
        assert_eq!(events[3], ShellEvent::Phase(Phase::Generating));
        assert_eq!(events[events.len() - 2], ShellEvent::Panels(bundle()));
    }

    #[tokio::test]
    async fn test_end_to_end_chat_adapter() {
        let chat = ScriptedChat::new(vec![
            MessageChunk::text("The "),
            MessageChunk::text("impact "),
            MessageChunk::text("is significant."),
            MessageChunk::metadata(json!({"stopReason": "end_turn"})),
        ]);
        let pipeline = ReportPipeline::new(
            researcher(),
            Arc::new(ChatAdapterStreamer::new(Arc::new(chat))),
            PromptOptions::default(),
        );

        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = pipeline
            .run(&ReportRequest::new(QUERY, "research_report"), tx)
            .await
            .unwrap();
        assert_eq!(outcome.report, "The impact is significant.");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let pipeline = ReportPipeline::new(
            researcher(),
            Arc::new(RawDeltaStreamer::new(Arc::new(three_chunk_envelopes()))),
            PromptOptions::default(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = pipeline
            .run(&ReportRequest::new("   ", "research_report"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_unknown_report_type_skips_research() {
        let researcher = researcher();
        let pipeline = ReportPipeline::new(
            researcher.clone(),
            Arc::new(RawDeltaStreamer::new(Arc::new(three_chunk_envelopes()))),
            PromptOptions::default(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = pipeline
            .run(&ReportRequest::new(QUERY, "haiku_report"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Prompt(PromptError::UnknownReportType(_))));
        assert!(researcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_research_failure_aborts_cycle() {
        let pipeline = ReportPipeline::new(
            Arc::new(StaticResearcher::failing("search backend unavailable")),
            Arc::new(RawDeltaStreamer::new(Arc::new(three_chunk_envelopes()))),
            PromptOptions::default(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = pipeline
            .run(&ReportRequest::new(QUERY, "research_report"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Research(ResearchError::Service(_))));

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, ShellEvent::Chunk(_) | ShellEvent::Panels(_))));
    }

    #[tokio::test]
    async fn test_stream_failure_propagates() {
        let pipeline = ReportPipeline::new(
            researcher(),
            Arc::new(RawDeltaStreamer::new(Arc::new(
                ScriptedEnvelopes::bedrock(vec![json!({"contentBlockDelta": {"delta": {"text": "The "}}})])
                    .fail_after(),
            ))),
            PromptOptions::default(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = pipeline
            .run(&ReportRequest::new(QUERY, "research_report"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Provider(ProviderError::StreamError(_))));
    }

    #[tokio::test]
    async fn test_detached_shell_stops_stream() {
        let pipeline = ReportPipeline::new(
            researcher(),
            Arc::new(RawDeltaStreamer::new(Arc::new(three_chunk_envelopes()))),
            PromptOptions::default(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let err = pipeline
            .run(&ReportRequest::new(QUERY, "research_report"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Detached));
    }

    #[tokio::test]
    async fn test_request_report_with_explicit_sink() {
        let pipeline = ReportPipeline::new(
            researcher(),
            Arc::new(RawDeltaStreamer::new(Arc::new(three_chunk_envelopes()))),
            PromptOptions::default(),
        );
        let mut sink = RecordingSink::default();
        let bundle = pipeline
            .request_report(QUERY, "research_report", &mut sink)
            .await
            .unwrap();

        assert!(!bundle.context.is_empty());
        assert_eq!(bundle.sources.len(), 1);
        assert_eq!(sink.events.len(), 2);
    }
}
