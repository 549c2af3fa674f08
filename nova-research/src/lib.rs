//! Nova Research - streamed research reports over a hosted LLM
//!
//! This crate provides:
//! - A research requester that gathers web context and streams its log events
//! - Prompt templates per report type
//! - Streaming LLM backends (Amazon Bedrock, LiteLLM) behind two interchangeable
//!   invocation styles
//! - A web UI shell (axum + server-sent events) and a terminal shell

pub mod api;
pub mod config;
pub mod lines;
pub mod logs;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod research;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use orchestrator::{ReportPipeline, ReportRequest, ShellEvent};
pub use provider::{ReportStreamer, StreamStyle};
pub use research::{ResearchBundle, Researcher};

use research::{HttpResearcher, ResearchError};
use std::sync::Arc;
use std::time::Duration;

/// Build the research client described by `config`
pub fn build_researcher(
    config: &config::ResearchConfig,
) -> Result<Arc<dyn Researcher>, ResearchError> {
    let researcher = match config.timeout_secs {
        Some(secs) => HttpResearcher::with_timeout(&config.base_url, Duration::from_secs(secs))?,
        None => HttpResearcher::new(&config.base_url)?,
    };
    Ok(Arc::new(researcher))
}
