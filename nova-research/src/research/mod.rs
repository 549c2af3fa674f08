//! Research requester: gathers web context for a query
//!
//! The heavy lifting happens in an external research service. This module
//! defines the typed contract at the boundary this crate controls.

mod http;

pub use http::HttpResearcher;

use crate::logs::LogSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while researching a query
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Research service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Research service error: {0}")]
    Service(String),

    #[error("Failed to decode research stream line: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Research stream ended without a result")]
    MissingResult,
}

/// A source consulted during research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            content: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// The four artifacts produced by one research run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    /// Assembled textual context
    #[serde(default)]
    pub context: String,

    /// Accumulated cost in USD
    #[serde(default)]
    pub costs: f64,

    /// Image URLs found while researching
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Anything that can research a query while reporting progress to a sink
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Name for logging/identification
    fn name(&self) -> &str;

    /// Run the research and wait for it to finish
    async fn conduct_research(
        &self,
        query: &str,
        report_type: &str,
        sink: &mut dyn LogSink,
    ) -> Result<ResearchBundle, ResearchError>;
}
