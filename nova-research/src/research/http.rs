//! HTTP research service client
//!
//! Protocol:
//! - `POST {base_url}/research` with `{"query": ..., "report_type": ...}`
//! - the response body is newline-delimited JSON; every line is one envelope
//!   - `{"type": "result", "context", "costs", "images", "sources"}` ends the run
//!   - `{"type": "error", "message": ...}` aborts it
//!   - anything else is a log event and goes to the sink

use super::{ResearchBundle, ResearchError, Researcher};
use crate::lines::LineDecoder;
use crate::logs::{LogEvent, LogSink};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Research service reached over HTTP
pub struct HttpResearcher {
    client: Client,
    base_url: String,
}

impl HttpResearcher {
    /// Create a client with no request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ResearchError> {
        Self::build(base_url, None)
    }

    /// Create a client that gives up after `timeout`
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ResearchError> {
        Self::build(base_url, Some(timeout))
    }

    fn build(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ResearchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct ResearchRequest<'a> {
    query: &'a str,
    report_type: &'a str,
}

/// What one decoded line means for the run
enum Envelope {
    Log(LogEvent),
    Result(ResearchBundle),
    Failed(String),
}

fn classify(line: &str) -> Result<Envelope, ResearchError> {
    let value: Value = serde_json::from_str(line)?;

    match value.get("type").and_then(Value::as_str) {
        Some("result") => Ok(Envelope::Result(serde_json::from_value(value)?)),
        Some("error") => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            Ok(Envelope::Failed(message))
        }
        _ => Ok(Envelope::Log(LogEvent::new(value))),
    }
}

#[async_trait]
impl Researcher for HttpResearcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn conduct_research(
        &self,
        query: &str,
        report_type: &str,
        sink: &mut dyn LogSink,
    ) -> Result<ResearchBundle, ResearchError> {
        let url = format!("{}/research", self.base_url);
        info!(url = %url, report_type, "Starting research");

        let response = self
            .client
            .post(&url)
            .json(&ResearchRequest { query, report_type })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Status { status, body });
        }

        let mut body = response.bytes_stream();
        let mut decoder = LineDecoder::new();
        let mut log_count = 0usize;

        while let Some(chunk) = body.next().await {
            for line in decoder.push(&chunk?) {
                if let Some(bundle) = handle_line(&line, sink, &mut log_count).await? {
                    return Ok(bundle);
                }
            }
        }
        if let Some(line) = decoder.finish() {
            if let Some(bundle) = handle_line(&line, sink, &mut log_count).await? {
                return Ok(bundle);
            }
        }

        debug!(log_events = log_count, "Research stream closed without a result");
        Err(ResearchError::MissingResult)
    }
}

/// Route one line: log events go to the sink, a result ends the run
async fn handle_line(
    line: &str,
    sink: &mut dyn LogSink,
    log_count: &mut usize,
) -> Result<Option<ResearchBundle>, ResearchError> {
    match classify(line)? {
        Envelope::Log(event) => {
            *log_count += 1;
            sink.accept(event).await;
            Ok(None)
        }
        Envelope::Result(bundle) => {
            info!(
                log_events = *log_count,
                sources = bundle.sources.len(),
                images = bundle.images.len(),
                costs = bundle.costs,
                "Research finished"
            );
            Ok(Some(bundle))
        }
        Envelope::Failed(message) => Err(ResearchError::Service(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_router, RecordingSink};
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let researcher = HttpResearcher::new("http://research:8000/").unwrap();
        assert_eq!(researcher.base_url(), "http://research:8000");

        let researcher =
            HttpResearcher::with_timeout("http://research:8000", Duration::from_secs(5)).unwrap();
        assert_eq!(researcher.base_url(), "http://research:8000");
    }

    fn service(chunks: Vec<&'static str>) -> Router {
        Router::new().route(
            "/research",
            post(move |Json(request): Json<Value>| {
                let chunks = chunks.clone();
                async move {
                    assert_eq!(request["report_type"], "research_report");
                    let stream = futures::stream::iter(
                        chunks.into_iter().map(Ok::<_, std::io::Error>),
                    );
                    Body::from_stream(stream)
                }
            }),
        )
    }

    #[test]
    fn test_classify_envelopes() {
        assert!(matches!(
            classify(r#"{"type":"logs","content":"starting_research"}"#).unwrap(),
            Envelope::Log(_)
        ));
        assert!(matches!(classify(r#"{"no_type":1}"#).unwrap(), Envelope::Log(_)));
        assert!(matches!(
            classify(r#"{"type":"error","message":"boom"}"#).unwrap(),
            Envelope::Failed(m) if m == "boom"
        ));
        assert!(matches!(
            classify(r#"{"type":"result","context":"c"}"#).unwrap(),
            Envelope::Result(b) if b.context == "c"
        ));
        assert!(classify("not json").is_err());
    }

    #[tokio::test]
    async fn test_streams_logs_then_result() {
        let base = spawn_router(service(vec![
            "{\"type\":\"logs\",\"content\":\"starting_research\"}\n{\"type\":\"lo",
            "gs\",\"output\":\"no label\"}\n",
            "{\"type\":\"result\",\"context\":\"Steel tariffs raised prices.\",\"costs\":0.012,",
            "\"images\":[\"https://img.example/1.png\"],\"sources\":[{\"url\":\"https://example.com/steel\"}]}\n",
        ]))
        .await;

        let researcher = HttpResearcher::new(format!("{}/", base)).unwrap();
        let mut sink = RecordingSink::default();
        let bundle = researcher
            .conduct_research("impact of tariffs on steel prices", "research_report", &mut sink)
            .await
            .unwrap();

        assert_eq!(bundle.context, "Steel tariffs raised prices.");
        assert_eq!(bundle.costs, 0.012);
        assert_eq!(bundle.images.len(), 1);
        assert_eq!(bundle.sources[0].url, "https://example.com/steel");

        let labels: Vec<_> = sink.events.iter().map(|e| e.label()).collect();
        assert_eq!(labels, vec!["starting_research", "Log..."]);
    }

    #[tokio::test]
    async fn test_result_without_trailing_newline() {
        let base = spawn_router(service(vec!["{\"type\":\"result\",\"context\":\"\"}"])).await;
        let researcher = HttpResearcher::new(base).unwrap();
        let mut sink = RecordingSink::default();
        let bundle = researcher
            .conduct_research("q", "research_report", &mut sink)
            .await
            .unwrap();
        assert!(bundle.sources.is_empty());
        assert!(sink.events.is_empty());
    }

    #[tokio::test]
    async fn test_service_error_propagates() {
        let base = spawn_router(service(vec![
            "{\"content\":\"fetching\"}\n{\"type\":\"error\",\"message\":\"search quota exhausted\"}\n",
        ]))
        .await;
        let researcher = HttpResearcher::new(base).unwrap();
        let mut sink = RecordingSink::default();
        let err = researcher
            .conduct_research("q", "research_report", &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Service(m) if m == "search quota exhausted"));
        assert_eq!(sink.events.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_result() {
        let base = spawn_router(service(vec!["{\"content\":\"only logs\"}\n"])).await;
        let researcher = HttpResearcher::new(base).unwrap();
        let mut sink = RecordingSink::default();
        let err = researcher
            .conduct_research("q", "research_report", &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::MissingResult));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let router = Router::new().route(
            "/research",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down").into_response() }),
        );
        let base = spawn_router(router).await;
        let researcher = HttpResearcher::new(base).unwrap();
        let mut sink = RecordingSink::default();
        let err = researcher
            .conduct_research("q", "research_report", &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Status { status: 502, ref body } if body == "upstream down"));
    }
}
