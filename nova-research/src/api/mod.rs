//! Web UI shell
//!
//! Serves the research page and streams each request cycle to the browser as
//! server-sent events: `phase`, `log`, `chunk`, `panels`, `failure`.

use crate::orchestrator::{ReportPipeline, ReportRequest, ShellEvent};
use crate::prompt::ReportType;
use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html,
    },
    routing::get,
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// API state
pub struct ApiState {
    pub pipeline: Arc<ReportPipeline>,
    pub default_report_type: ReportType,
    /// One permit: at most one active cycle
    active: Arc<Semaphore>,
}

impl ApiState {
    pub fn new(pipeline: Arc<ReportPipeline>, default_report_type: ReportType) -> Self {
        Self {
            pipeline,
            default_report_type,
            active: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn busy(&self) -> bool {
        self.active.available_permits() == 0
    }
}

/// Query parameters of a research request
#[derive(Debug, Deserialize)]
pub struct ResearchParams {
    /// The research query
    pub query: String,
    /// Optional: Override the configured report type
    #[serde(default)]
    pub report_type: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pipeline: String,
    pub busy: bool,
}

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(research_page))
        .route("/health", get(health_check))
        .route("/research", get(research_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pipeline: state.pipeline.describe(),
        busy: state.busy(),
    })
}

/// Run one cycle and stream its events
async fn research_stream(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ResearchParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    if params.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query must not be empty".to_string()));
    }

    let permit = Arc::clone(&state.active)
        .try_acquire_owned()
        .map_err(|_| {
            (
                StatusCode::CONFLICT,
                "A research query is already running".to_string(),
            )
        })?;

    let report_type = params
        .report_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| state.default_report_type.to_string());
    let request = ReportRequest::new(params.query, report_type);
    info!(query = %request.query, report_type = %request.report_type, "Research requested");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = Arc::clone(&state.pipeline);

    tokio::spawn(async move {
        let _permit = permit;
        if let Err(e) = pipeline.run(&request, tx.clone()).await {
            warn!(error = %e, "Report cycle failed");
            let _ = tx.send(ShellEvent::Error(e.to_string()));
        }
    });

    let events = stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(to_sse(&event));
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Encode a shell event as a named SSE event with a JSON payload
fn to_sse(event: &ShellEvent) -> Event {
    let (name, payload) = match event {
        ShellEvent::Phase(phase) => ("phase", serde_json::to_string(&json!({ "phase": phase }))),
        ShellEvent::Log(entry) => ("log", serde_json::to_string(entry)),
        ShellEvent::Chunk(text) => ("chunk", serde_json::to_string(&json!({ "text": text }))),
        ShellEvent::Panels(bundle) => ("panels", serde_json::to_string(bundle)),
        ShellEvent::Error(message) => ("failure", serde_json::to_string(&json!({ "message": message }))),
    };

    match payload {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => Event::default()
            .event("failure")
            .data(json!({ "message": e.to_string() }).to_string()),
    }
}

/// Research page
async fn research_page() -> Html<&'static str> {
    Html(RESEARCH_HTML)
}

const RESEARCH_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>GPT Researcher with Amazon Nova</title>
    <style>
        :root {
            --bg: #1a1a2e;
            --card: #16213e;
            --accent: #0f3460;
            --highlight: #e94560;
            --text: #eee;
            --muted: #888;
            --success: #4ade80;
            --error: #f87171;
        }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: 'SF Mono', 'Consolas', monospace;
            background: var(--bg);
            color: var(--text);
            min-height: 100vh;
            display: grid;
            grid-template-columns: 320px 1fr;
        }
        aside {
            background: var(--card);
            padding: 15px;
            overflow-y: auto;
            max-height: 100vh;
            position: sticky;
            top: 0;
        }
        aside h2 {
            font-size: 0.9rem;
            color: var(--muted);
            margin-bottom: 15px;
            text-transform: uppercase;
            letter-spacing: 1px;
        }
        main { padding: 20px; max-width: 1100px; }
        h1 {
            font-size: 1.5rem;
            margin-bottom: 20px;
            color: var(--highlight);
        }
        .input-section {
            background: var(--card);
            padding: 20px;
            border-radius: 12px;
            margin-bottom: 20px;
        }
        label {
            font-size: 0.85rem;
            color: var(--muted);
            margin-bottom: 5px;
            display: block;
        }
        input, select {
            width: 100%;
            background: var(--bg);
            border: 1px solid var(--accent);
            border-radius: 8px;
            padding: 12px;
            color: var(--text);
            font-family: inherit;
            font-size: 0.9rem;
            margin-bottom: 15px;
        }
        input:focus, select:focus { outline: none; border-color: var(--highlight); }
        button {
            background: var(--highlight);
            color: white;
            border: none;
            padding: 12px 30px;
            border-radius: 8px;
            font-size: 1rem;
            cursor: pointer;
            font-weight: 600;
        }
        button:disabled { opacity: 0.5; cursor: not-allowed; }
        .spinner { color: var(--muted); margin: 10px 0; }
        .report {
            background: var(--card);
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
            white-space: pre-wrap;
            word-break: break-word;
            line-height: 1.6;
            min-height: 80px;
        }
        .failure {
            background: linear-gradient(135deg, #7f1d1d, #450a0a);
            color: var(--error);
            border-radius: 12px;
            padding: 15px 20px;
            margin-bottom: 20px;
        }
        details {
            background: var(--accent);
            border-radius: 8px;
            margin-bottom: 8px;
            padding: 10px 12px;
        }
        summary { cursor: pointer; font-size: 0.85rem; }
        pre {
            background: var(--bg);
            border-radius: 8px;
            padding: 12px;
            margin-top: 8px;
            overflow-x: auto;
            font-size: 0.8rem;
            white-space: pre-wrap;
            word-break: break-word;
        }
        .images img { max-width: 240px; margin: 8px 8px 0 0; border-radius: 6px; }
        .hidden { display: none; }
    </style>
</head>
<body>
    <aside>
        <h2>Research log</h2>
        <div id="logs"></div>
    </aside>
    <main>
        <h1>GPT Researcher with Amazon Nova</h1>
        <div class="input-section">
            <label for="query">Enter your query:</label>
            <input id="query" type="text" placeholder="impact of tariffs on steel prices">
            <label for="reportType">Report type</label>
            <select id="reportType">
                <option value="research_report">research_report</option>
                <option value="resource_report">resource_report</option>
                <option value="outline_report">outline_report</option>
                <option value="custom_report">custom_report</option>
            </select>
            <button id="startBtn" onclick="start()">Start</button>
            <div id="spinner" class="spinner hidden">Researching...</div>
        </div>
        <div id="failure" class="failure hidden"></div>
        <div id="report" class="report hidden"></div>
        <div id="panels" class="hidden">
            <details><summary>costs</summary><pre id="costs"></pre></details>
            <details><summary>sources</summary><pre id="sources"></pre></details>
            <details><summary>context</summary><pre id="context"></pre></details>
            <details><summary>images</summary><div id="images" class="images"></div></details>
        </div>
    </main>
    <script>
        const $ = (id) => document.getElementById(id);

        function reset() {
            $('logs').innerHTML = '';
            $('report').textContent = '';
            $('report').classList.add('hidden');
            $('panels').classList.add('hidden');
            $('failure').classList.add('hidden');
        }

        function fail(message) {
            $('failure').textContent = message;
            $('failure').classList.remove('hidden');
        }

        function addLog(entry) {
            const details = document.createElement('details');
            const summary = document.createElement('summary');
            summary.textContent = entry.label;
            const pre = document.createElement('pre');
            pre.textContent = JSON.stringify(entry.event, null, 2);
            details.appendChild(summary);
            details.appendChild(pre);
            $('logs').appendChild(details);
        }

        function showPanels(bundle) {
            $('costs').textContent = String(bundle.costs);
            $('sources').textContent = JSON.stringify(bundle.sources, null, 2);
            $('context').textContent = bundle.context;
            const images = $('images');
            images.innerHTML = '';
            for (const url of bundle.images) {
                const img = document.createElement('img');
                img.src = url;
                img.alt = url;
                images.appendChild(img);
            }
            $('panels').classList.remove('hidden');
        }

        function handle(name, data) {
            switch (name) {
                case 'phase':
                    $('spinner').classList.toggle('hidden', data.phase !== 'researching');
                    if (data.phase === 'generating') $('report').classList.remove('hidden');
                    break;
                case 'log': addLog(data); break;
                case 'chunk': $('report').textContent += data.text; break;
                case 'panels': showPanels(data); break;
                case 'failure':
                    $('spinner').classList.add('hidden');
                    fail(data.message);
                    break;
            }
        }

        async function start() {
            const query = $('query').value.trim();
            if (!query) return;
            reset();
            $('startBtn').disabled = true;

            const params = new URLSearchParams({ query, report_type: $('reportType').value });
            try {
                const response = await fetch('/research?' + params.toString());
                if (!response.ok) {
                    fail(await response.text());
                    return;
                }
                const reader = response.body.getReader();
                const decoder = new TextDecoder();
                let buffer = '';
                while (true) {
                    const { value, done } = await reader.read();
                    if (done) break;
                    buffer += decoder.decode(value, { stream: true });
                    let split;
                    while ((split = buffer.indexOf('\n\n')) !== -1) {
                        const block = buffer.slice(0, split);
                        buffer = buffer.slice(split + 2);
                        let name = 'message';
                        const data = [];
                        for (const line of block.split('\n')) {
                            if (line.startsWith('event:')) name = line.slice(6).trim();
                            else if (line.startsWith('data:')) data.push(line.slice(5).replace(/^ /, ''));
                        }
                        if (data.length) handle(name, JSON.parse(data.join('\n')));
                    }
                }
            } catch (err) {
                fail(String(err));
            } finally {
                $('spinner').classList.add('hidden');
                $('startBtn').disabled = false;
            }
        }

        $('query').addEventListener('keydown', (e) => { if (e.key === 'Enter') start(); });
    </script>
</body>
</html>
"##;
