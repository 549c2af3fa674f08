//! Nova Research web server

use anyhow::{Context, Result};
use nova_research::api::{create_router, ApiState};
use nova_research::provider::build_streamer;
use nova_research::{build_researcher, AppConfig, ReportPipeline};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = "nova-research.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Nova Research server v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(std::env::args().nth(1))?;

    info!(
        bind = %config.server.bind,
        research_url = %config.research.base_url,
        provider = %config.model.provider,
        style = %config.model.style,
        model = %config.model.model_id,
        "Loaded configuration"
    );

    let researcher = build_researcher(&config.research).context("Failed to create research client")?;
    let streamer = build_streamer(&config.model)
        .await
        .context("Failed to create model streamer")?;

    let mut options = config.prompt.clone();
    if options.current_date.is_none() {
        options.current_date = Some(chrono::Local::now().format("%B %d, %Y").to_string());
    }

    let pipeline = Arc::new(ReportPipeline::new(researcher, streamer, options));
    let state = Arc::new(ApiState::new(pipeline, config.research.report_type));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on {}", config.server.bind);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Explicit path must exist; the default file is optional
fn load_config(path: Option<String>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            AppConfig::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path))?
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            let contents = std::fs::read_to_string(DEFAULT_CONFIG)
                .with_context(|| format!("Failed to read config file: {}", DEFAULT_CONFIG))?;
            AppConfig::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", DEFAULT_CONFIG))?
        }
        None => AppConfig::default(),
    };

    config.apply_env().context("Invalid environment override")?;
    Ok(config)
}
