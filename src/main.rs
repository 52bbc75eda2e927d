//! fondrag - Main CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use fondrag::cli::{Args, Commands};
use fondrag::config::{Config, EmbeddingProviderKind};
use fondrag::corpus::CorpusLoader;
use fondrag::doctor::{self, ComponentHealth, HealthStatus};
use fondrag::embedding::{EmbeddingProvider, HashedEmbedder, LocalEmbedder};
use fondrag::generation::ChatBackend;
use fondrag::rag::RagPipeline;
use fondrag::telemetry::TelemetryCollector;
use fondrag::RagError;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(message) = args.validate() {
        eprintln!("{}", message.red());
        std::process::exit(1);
    }

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match &args.command {
        Some(Commands::Config) => show_config(&config),
        Some(Commands::Doctor) => run_doctor(&args, &config).await,
        Some(Commands::Chat) => {
            let pipeline = build_pipeline(&args, &config, false).await?;
            run_chat(&pipeline).await
        }
        None => {
            // validate() guarantees the query is present here
            let query = args.query.clone().unwrap_or_default();
            let pipeline = build_pipeline(&args, &config, false).await?;
            run_ask(&pipeline, &query).await
        }
    }
}

fn select_embedder(config: &Config, force_offline: bool) -> Result<Arc<dyn EmbeddingProvider>> {
    if force_offline || config.embedding.provider == EmbeddingProviderKind::Hashed {
        return Ok(Arc::new(HashedEmbedder::new(config.embedding.dimension)));
    }

    let embedder = LocalEmbedder::new(&config.embedding.model_id, config.embedding.dimension)
        .context("Failed to load the embedding model")?;
    Ok(Arc::new(embedder))
}

/// One-time startup: load the corpus, build the index, wire the pipeline.
/// Build failures (bad corpus file, dimension mismatch) abort here, before
/// any query is served.
async fn build_pipeline(
    args: &Args,
    config: &Config,
    force_offline: bool,
) -> Result<RagPipeline<ChatBackend>> {
    let embedder = select_embedder(config, force_offline || args.offline)?;

    let knowledge_path = match &args.knowledge {
        Some(path) => path.clone(),
        None => config.knowledge_path()?,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message("Building knowledge index...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let loader = CorpusLoader::new(embedder.clone(), config.knowledge.max_chunk_chars);
    let knowledge = loader
        .load(&knowledge_path)
        .await
        .context("Failed to build the knowledge base")?;

    spinner.finish_with_message(format!(
        "Knowledge base ready: {} chunks",
        knowledge.document_count()
    ));

    let backend = ChatBackend::new(&config.backend)?;

    Ok(RagPipeline::new(
        Arc::new(knowledge),
        embedder,
        backend,
        config,
        TelemetryCollector::new(),
    ))
}

async fn run_ask(pipeline: &RagPipeline<ChatBackend>, query: &str) -> Result<()> {
    match pipeline.answer(query).await {
        Ok(result) => {
            println!("\n{}\n", result.response_text);
            print_answer_footer(result.context_found, result.processing_time_seconds);
            Ok(())
        }
        Err(RagError::InvalidQuery(reason)) => {
            eprintln!("{}", reason.yellow());
            std::process::exit(1);
        }
        Err(error) => Err(error.into()),
    }
}

async fn run_chat(pipeline: &RagPipeline<ChatBackend>) -> Result<()> {
    println!(
        "{}",
        "💼 Investment consultation assistant. Ask about investment units and funds; type 'exit' to quit."
            .bold()
    );

    let mut editor = rustyline::DefaultEditor::new()?;

    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                let _ = editor.add_history_entry(line);

                match pipeline.answer(line).await {
                    Ok(result) => {
                        println!("\n{}\n", result.response_text);
                        print_answer_footer(result.context_found, result.processing_time_seconds);
                    }
                    Err(RagError::InvalidQuery(reason)) => println!("{}", reason.yellow()),
                    Err(error) => println!("{}", format!("Error: {}", error).red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        }
    }

    pipeline.telemetry().display_summary();
    Ok(())
}

fn print_answer_footer(context_found: bool, processing_seconds: f64) {
    let note = if context_found {
        "📚 grounded in the knowledge base"
    } else {
        "❓ no knowledge-base match"
    };
    println!(
        "{}",
        format!("{} · {:.2}s", note, processing_seconds).dimmed()
    );
}

async fn run_doctor(args: &Args, config: &Config) -> Result<()> {
    println!("{}", "Running diagnostics...".bold());

    // Host-side checks first, then the pipeline's own component report.
    // The offline embedder keeps doctor runs free of model downloads.
    let mut checks = vec![doctor::check_config(config), doctor::check_memory()];

    let pipeline = build_pipeline(args, config, true).await?;
    checks.extend(pipeline.health_check().await);

    println!();
    for check in &checks {
        print_check(check);
    }
    println!();

    if checks
        .iter()
        .any(|c| c.status == HealthStatus::Unhealthy)
    {
        std::process::exit(1);
    }

    Ok(())
}

fn print_check(check: &ComponentHealth) {
    let marker = match check.status {
        HealthStatus::Healthy => check.status.marker().green(),
        HealthStatus::Degraded => check.status.marker().yellow(),
        HealthStatus::Unhealthy => check.status.marker().red(),
    };
    println!("{} {:<20} {}", marker, check.component, check.detail.dimmed());
}

fn show_config(config: &Config) -> Result<()> {
    let path = Config::config_path()?;
    println!("{} {}", "Config file:".bold(), path.display());

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("\n{}", rendered);

    Ok(())
}
