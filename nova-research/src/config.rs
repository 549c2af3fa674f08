//! Process-wide configuration
//!
//! Loaded once at startup: an optional TOML file, then environment overrides.
//! There is no runtime reconfiguration.

use crate::prompt::{PromptOptions, ReportType, Tone};
use crate::provider::{ProviderKind, StreamStyle};
use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl ToString) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub prompt: PromptOptions,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8501))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// Research service settings
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_research_url")]
    pub base_url: String,

    /// Report type used when a request does not name one
    #[serde(default = "default_report_type")]
    pub report_type: ReportType,

    /// Give up on the research call after this many seconds (no limit when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_research_url() -> String { "http://localhost:8000".to_string() }
fn default_report_type() -> ReportType { ReportType::ResearchReport }

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_research_url(),
            report_type: default_report_type(),
            timeout_secs: None,
        }
    }
}

/// Hosted model settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_style")]
    pub style: StreamStyle,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// AWS region; falls back to the SDK's own resolution when unset
    #[serde(default)]
    pub region: Option<String>,

    /// LiteLLM proxy URL
    #[serde(default = "default_litellm_url")]
    pub base_url: String,

    /// LiteLLM API key
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_provider() -> ProviderKind { ProviderKind::Bedrock }
fn default_style() -> StreamStyle { StreamStyle::RawDelta }
fn default_model_id() -> String { "us.amazon.nova-pro-v1:0".to_string() }
fn default_litellm_url() -> String { "http://localhost:4000".to_string() }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            style: default_style(),
            model_id: default_model_id(),
            region: None,
            base_url: default_litellm_url(),
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; missing sections take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("NOVA_BIND") {
            self.server.bind = bind
                .parse()
                .map_err(|e| ConfigError::invalid("NOVA_BIND", e))?;
        }
        if let Some(url) = lookup("NOVA_RESEARCH_URL") {
            self.research.base_url = url;
        }
        if let Some(report_type) = lookup("NOVA_REPORT_TYPE") {
            self.research.report_type = report_type
                .parse()
                .map_err(|e| ConfigError::invalid("NOVA_REPORT_TYPE", e))?;
        }
        if let Some(language) = lookup("NOVA_LANGUAGE") {
            self.prompt.language = language;
        }
        if let Some(tone) = lookup("NOVA_TONE") {
            let tone: Tone = tone.parse().map_err(|e| ConfigError::invalid("NOVA_TONE", e))?;
            self.prompt.tone = Some(tone);
        }
        if let Some(provider) = lookup("NOVA_PROVIDER") {
            self.model.provider = provider
                .parse()
                .map_err(|e| ConfigError::invalid("NOVA_PROVIDER", e))?;
        }
        if let Some(style) = lookup("NOVA_STREAM_STYLE") {
            self.model.style = style
                .parse()
                .map_err(|e| ConfigError::invalid("NOVA_STREAM_STYLE", e))?;
        }
        if let Some(model_id) = lookup("NOVA_MODEL_ID") {
            self.model.model_id = model_id;
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.model.region = Some(region);
        }
        if let Some(url) = lookup("NOVA_LITELLM_URL") {
            self.model.base_url = url;
        }
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("LITELLM_API_KEY").or_else(|| lookup("LITELLM_MASTER_KEY"));
        }
        Ok(())
    }
}
