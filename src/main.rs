use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logsleuth::config::Config;
use logsleuth::graph::TracingObserver;
use logsleuth::orchestrator::Orchestrator;
use logsleuth::reasoning::{OllamaClient, ReasoningGateway};
use logsleuth::retrieval::{RagCoordinator, Reranker};
use logsleuth::sources::{HashingEmbedder, InMemoryVectorStore, LogEntry, StaticLogSource};

/// Agentic log investigation from the command line.
#[derive(Debug, Parser)]
#[command(name = "logsleuth", version, about)]
struct Cli {
    /// The investigation query.
    query: String,

    /// Correlation id scoping evidence to one operational session.
    #[arg(long)]
    correlation_id: Option<String>,

    /// JSONL file of log entries ({"timestamp", "level", "message"} per
    /// line, with an optional "correlation_id" field).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Override the investigation iteration cap.
    #[arg(long)]
    max_iterations: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(max_iterations) = cli.max_iterations {
        config.agent.max_iterations = max_iterations;
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Logsleuth starting..."
    );

    // Load log evidence
    let logs = match &cli.log_file {
        Some(path) => match load_log_file(path) {
            Ok(source) => {
                info!(path = %path.display(), "Log file loaded");
                source
            }
            Err(e) => {
                error!(error = %e, "Failed to load log file");
                return Err(e);
            }
        },
        None => StaticLogSource::new(),
    };

    // Initialize the reasoning backend client
    let backend = match OllamaClient::new(&config.backend, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.backend.base_url, model = %config.backend.model, "Backend client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize backend client");
            return Err(e.into());
        }
    };

    let gateway = Arc::new(ReasoningGateway::new(
        Arc::new(backend),
        config.agent.max_evidence_docs,
    ));
    let coordinator = Arc::new(RagCoordinator::new(
        Arc::new(logs),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(HashingEmbedder::default()),
        Reranker::lexical(),
        config.retrieval.clone(),
    ));

    let orchestrator = Orchestrator::new(coordinator, gateway, config.agent.clone())
        .with_observer(Arc::new(TracingObserver));

    let cancel = CancellationToken::new();
    let report = orchestrator
        .investigate_with_cancel(&cli.query, cli.correlation_id.as_deref(), &cancel)
        .await;

    println!("{}", report.answer);

    if report.error.is_some() {
        std::process::exit(2);
    }
    Ok(())
}

/// Parse a JSONL log file into a static log source.
fn load_log_file(path: &PathBuf) -> anyhow::Result<StaticLogSource> {
    #[derive(serde::Deserialize)]
    struct Line {
        #[serde(flatten)]
        entry: LogEntry,
        correlation_id: Option<String>,
    }

    let content = std::fs::read_to_string(path)?;
    let mut source = StaticLogSource::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Line = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("line {}: {}", number + 1, e))?;
        match parsed.correlation_id {
            Some(cid) => source.push_correlated(&cid, parsed.entry),
            None => source.push(parsed.entry),
        }
    }
    Ok(source)
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        logsleuth::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        logsleuth::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
