//! Nova Research CLI - research a query and stream the report to the terminal
//!
//! Usage:
//!   nova-research <query> [--report-type <type>] [--style <style>] [--verbose]
//!
//! Example:
//!   nova-research "Impact of tariffs on steel prices" --language English
//!   nova-research "Rust async runtimes" --style chat_adapter --provider litellm

use anyhow::{bail, Context, Result};
use colored::Colorize;
use nova_research::orchestrator::{Phase, ReportRequest, ShellEvent};
use nova_research::prompt::Tone;
use nova_research::provider::{build_streamer, ProviderKind};
use nova_research::research::ResearchBundle;
use nova_research::{build_researcher, AppConfig, ReportPipeline, StreamStyle};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = "nova-research.toml";

fn print_usage() {
    eprintln!(
        r#"
{} - Research a query on the web and stream a report from a hosted LLM

{}
    nova-research <QUERY> [OPTIONS]

{}
    <QUERY>    What to research

{}
    -r, --report-type <TYPE>    research_report, resource_report, outline_report, custom_report
    -c, --config <FILE>         TOML config file (default: nova-research.toml if present)
    -s, --style <STYLE>         Invocation style: raw_delta or chat_adapter
    -p, --provider <PROVIDER>   Model backend: bedrock or litellm
    -l, --language <LANG>       Report language (default: Japanese)
    -w, --words <N>             Target report length in words (default: 1000)
    -t, --tone <TONE>           Writing tone, e.g. Objective, Analytical
    -v, --verbose               Show full log payloads and debug tracing
    -h, --help                  Print this help message

{}
    nova-research "What is the state of solid-state batteries?"
    nova-research "Open-source LLM licensing" -r outline_report -l English
    nova-research "Rust async runtimes" -s chat_adapter -p litellm -v
"#,
        "Nova Research".bold(),
        "USAGE:".bold(),
        "ARGS:".bold(),
        "OPTIONS:".bold(),
        "EXAMPLES:".bold(),
    );
}

struct CliArgs {
    query: String,
    report_type: Option<String>,
    config: Option<PathBuf>,
    style: Option<StreamStyle>,
    provider: Option<ProviderKind>,
    language: Option<String>,
    words: Option<u32>,
    tone: Option<Tone>,
    verbose: bool,
}

fn parse_args() -> Result<CliArgs> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.iter().any(|a| a == "--help" || a == "-h") {
            0
        } else {
            1
        });
    }

    let mut query: Option<String> = None;
    let mut report_type = None;
    let mut config = None;
    let mut style: Option<StreamStyle> = None;
    let mut provider: Option<ProviderKind> = None;
    let mut language = None;
    let mut words: Option<u32> = None;
    let mut tone: Option<Tone> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--report-type" | "-r" => report_type = Some(value_for(&args, &mut i, flag)?),
            "--config" | "-c" => config = Some(PathBuf::from(value_for(&args, &mut i, flag)?)),
            "--style" | "-s" => style = Some(value_for(&args, &mut i, flag)?.parse()?),
            "--provider" | "-p" => provider = Some(value_for(&args, &mut i, flag)?.parse()?),
            "--language" | "-l" => language = Some(value_for(&args, &mut i, flag)?),
            "--words" | "-w" => {
                let raw = value_for(&args, &mut i, flag)?;
                words = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid word count: {}", raw))?,
                );
            }
            "--tone" | "-t" => tone = Some(value_for(&args, &mut i, flag)?.parse()?),
            "--verbose" | "-v" => verbose = true,
            other if other.starts_with('-') => bail!("Unknown option: {}", other),
            other => {
                if query.is_some() {
                    bail!("Unexpected argument: {}", other);
                }
                query = Some(other.to_string());
            }
        }
        i += 1;
    }

    let Some(query) = query else {
        bail!("Missing <QUERY>");
    };

    Ok(CliArgs {
        query,
        report_type,
        config,
        style,
        provider,
        language,
        words,
        tone,
        verbose,
    })
}

fn value_for(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.clone()),
        None => bail!("{} requires a value", flag),
    }
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            AppConfig::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => AppConfig::default(),
    };
    config.apply_env().context("Invalid environment override")?;

    // Command-line flags win over file and environment
    if let Some(style) = args.style {
        config.model.style = style;
    }
    if let Some(provider) = args.provider {
        config.model.provider = provider;
    }
    if let Some(language) = &args.language {
        config.prompt.language = language.clone();
    }
    if let Some(words) = args.words {
        config.prompt.total_words = words;
    }
    if let Some(tone) = args.tone {
        config.prompt.tone = Some(tone);
    }
    if config.prompt.current_date.is_none() {
        config.prompt.current_date = Some(chrono::Local::now().format("%B %d, %Y").to_string());
    }
    Ok(config)
}

fn print_header(query: &str, report_type: &str, pipeline: &ReportPipeline) {
    eprintln!();
    eprintln!(
        "{}",
        "╭──────────────────────────────────────────────────────────────╮".blue()
    );
    eprintln!("{}  {}", "│".blue(), "Nova Research".bold());
    eprintln!(
        "{}",
        "├──────────────────────────────────────────────────────────────┤".blue()
    );
    eprintln!("{}  {}  {}", "│".blue(), "Query:".dimmed(), truncate(query, 50));
    eprintln!("{}  {}   {}", "│".blue(), "Type:".dimmed(), report_type);
    eprintln!("{}  {}  {}", "│".blue(), "Using:".dimmed(), pipeline.describe());
    let options = pipeline.options();
    eprintln!(
        "{}  {} {}, {} words, {}",
        "│".blue(),
        "Output:".dimmed(),
        options.language,
        options.total_words,
        options.report_format
    );
    eprintln!(
        "{}",
        "╰──────────────────────────────────────────────────────────────╯".blue()
    );
    eprintln!();
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn print_panels(bundle: &ResearchBundle) {
    eprintln!();
    eprintln!("{}", "── Research Costs ──".cyan());
    eprintln!("   ${:.4}", bundle.costs);

    eprintln!("{}", "── Sources ──".cyan());
    if bundle.sources.is_empty() {
        eprintln!("   {}", "(none)".dimmed());
    }
    for source in &bundle.sources {
        match &source.title {
            Some(title) => eprintln!("   - {} {}", title, source.url.dimmed()),
            None => eprintln!("   - {}", source.url),
        }
    }

    eprintln!("{}", "── Images ──".cyan());
    if bundle.images.is_empty() {
        eprintln!("   {}", "(none)".dimmed());
    }
    for image in &bundle.images {
        eprintln!("   - {}", image);
    }

    eprintln!("{}", "── Research Context ──".cyan());
    eprintln!("{}", truncate(&bundle.context, 600).dimmed());
}

/// Render shell events until the pipeline closes the channel
async fn render_events(mut rx: mpsc::UnboundedReceiver<ShellEvent>, verbose: bool) {
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            ShellEvent::Phase(Phase::Researching) => {
                eprintln!("{}", "Researching...".yellow());
            }
            ShellEvent::Phase(Phase::Generating) => {
                eprintln!("{}", "Generating report...".yellow());
                eprintln!();
            }
            ShellEvent::Phase(Phase::Done) => {
                eprintln!();
                eprintln!("{}", "✓ Done".green().bold());
            }
            ShellEvent::Log(entry) => {
                eprintln!("{} {}", format!("[{:>3}]", entry.seq).dimmed(), entry.label);
                if verbose {
                    if let Ok(pretty) = serde_json::to_string_pretty(entry.event.as_value()) {
                        for line in pretty.lines() {
                            eprintln!("      {}", line.dimmed());
                        }
                    }
                }
            }
            ShellEvent::Chunk(fragment) => {
                print!("{}", fragment);
                let _ = stdout.flush();
            }
            ShellEvent::Panels(bundle) => {
                println!();
                print_panels(&bundle);
            }
            ShellEvent::Error(message) => {
                eprintln!("{} {}", "✗".red(), message.red());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = parse_args()?;

    let default_level = if args.verbose { "debug" } else { "warn" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args)?;
    let report_type = args
        .report_type
        .clone()
        .unwrap_or_else(|| config.research.report_type.to_string());

    let researcher =
        build_researcher(&config.research).context("Failed to create research client")?;
    let streamer = build_streamer(&config.model)
        .await
        .context("Failed to create model streamer")?;
    let pipeline = ReportPipeline::new(researcher, streamer, config.prompt.clone());

    print_header(&args.query, &report_type, &pipeline);

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render_events(rx, args.verbose));

    let request = ReportRequest::new(args.query.clone(), report_type);
    let result = pipeline.run(&request, tx).await;

    // The pipeline dropped its sender, so the renderer drains and exits
    let _ = renderer.await;

    match result {
        Ok(outcome) => {
            eprintln!(
                "{}",
                format!(
                    "{} log events, {} chars of report",
                    outcome.log_count,
                    outcome.report.chars().count()
                )
                .dimmed()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
