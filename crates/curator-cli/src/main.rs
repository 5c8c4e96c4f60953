mod collector;
mod config;
mod detail;
mod evaluator;
mod governor;
mod llm;
mod orchestrator;
mod platform;
mod publisher;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use curator_store::Store;

use crate::config::EnvConfig;
use crate::evaluator::Evaluator;
use crate::governor::RateGovernor;
use crate::llm::LlmClient;
use crate::orchestrator::{BatchOrchestrator, PlatformSource};
use crate::platform::PlatformClient;
use crate::publisher::JsonPublisher;

#[derive(Parser)]
#[command(
    name = "curator",
    about = "Daily column collection, LLM scoring, and feed generation"
)]
struct Cli {
    /// Directory holding urls.toml and prompts.toml
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily batch: collect, evaluate, publish
    Run {
        /// Regenerate the JSON feeds without collecting or evaluating
        #[arg(long)]
        json_only: bool,

        /// Restrict processing to these category tags
        #[arg(long, num_args = 1..)]
        categories: Vec<String>,

        /// Cap the number of references processed this run
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show reference, article, and evaluation counts
    Stats,
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else if let Ok(level) = std::env::var("LOG_LEVEL") {
        EnvFilter::new(level)
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    match log_file.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    }) {
        Some(file) => builder.with_writer(Arc::new(file)).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_file = std::env::var("LOG_FILE_PATH").ok().map(PathBuf::from);
    init_tracing(cli.verbose, log_file.as_deref());

    let result = match &cli.command {
        Commands::Run {
            json_only,
            categories,
            limit,
        } => cmd_run(&cli, *json_only, categories, *limit).await,
        Commands::Stats => cmd_stats(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn open_store(database_path: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = database_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Store::open(database_path)
        .with_context(|| format!("failed to open database {}", database_path.display()))
}

async fn cmd_run(
    cli: &Cli,
    json_only: bool,
    categories: &[String],
    limit: Option<usize>,
) -> anyhow::Result<()> {
    // Startup validation is fatal before any I/O happens
    let env = EnvConfig::from_env()?;
    if env.social.is_some() {
        tracing::debug!("social credentials present");
    }

    let store = open_store(&env.database_path)?;
    let publisher = JsonPublisher::new(&env.output_dir);

    if json_only {
        tracing::info!("regenerating JSON feeds only");
        publisher.publish_all(&store, Utc::now())?;
        println!("feeds regenerated at {}", env.output_dir.display());
        return Ok(());
    }

    let urls = config::load_urls_config(&cli.config_dir)?;
    let prompts = config::load_prompt_config(&cli.config_dir)?;
    if urls.collection_urls.is_empty() {
        tracing::warn!("no collection URLs configured; nothing to collect");
    }

    let client = PlatformClient::new(platform::DEFAULT_HOST, urls.collection_settings.timeout_seconds)?;
    let source = PlatformSource::new(
        client,
        urls.collection_urls.clone(),
        urls.collection_settings.clone(),
    );
    let evaluator = Evaluator::new(LlmClient::new(&env.llm_api_key)?, prompts);
    let governor = RateGovernor::with_defaults();

    let mut orchestrator = BatchOrchestrator::new(
        store,
        source,
        evaluator,
        publisher,
        urls.collection_settings.clone(),
        platform::DEFAULT_HOST.to_string(),
    );
    orchestrator.target_categories = (!categories.is_empty()).then(|| categories.to_vec());
    orchestrator.limit = limit;

    tokio::select! {
        outcome = orchestrator.run(&governor) => {
            let outcome = outcome?;
            println!("discovered:   {}", outcome.discovered);
            println!("saved refs:   {}", outcome.saved_references);
            println!("evaluated:    {}", outcome.evaluated);
            println!("paid skipped: {}", outcome.skipped_paid);
            println!("failed:       {}", outcome.failed);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; aborting batch");
            anyhow::bail!("batch aborted by user")
        }
    }
}

fn cmd_stats() -> anyhow::Result<()> {
    let database_path = config::database_path_from_env();
    let store = open_store(&database_path)?;

    println!("references:  {}", store.reference_count()?);
    for (category, count) in store.reference_counts_by_category()? {
        println!("  {category}: {count}");
    }
    println!(
        "articles:    {} ({} evaluated)",
        store.article_count()?,
        store.evaluated_article_count()?
    );
    println!("evaluations: {}", store.evaluation_count()?);
    println!(
        "db size:     {:.1}KB",
        store.db_size() as f64 / 1024.0
    );
    Ok(())
}
