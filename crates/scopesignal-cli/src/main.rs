mod display;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use scopesignal_ai::{BatchItem, BatchOutcome, ChatClient, Classifier, EvaluationReport, evaluate};
use scopesignal_core::{ClassifierConfig, Trade};
use scopesignal_core::config::{
    DEFAULT_BASE_URL, DEFAULT_CACHE_DIR, DEFAULT_MAX_RETRIES, DEFAULT_MODEL,
};
use scopesignal_store::ResultCache;
use serde::{Deserialize, Serialize};
use tracing::{Level, info};

#[derive(Debug, Parser)]
#[command(name = "scopesignal", version)]
#[command(about = "Classify public project updates into bid-opportunity signals")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log debug events to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Settings {
    #[arg(long, global = true, env = "SCOPESIGNAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, global = true, env = "SCOPESIGNAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, global = true, env = "SCOPESIGNAL_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, global = true, env = "SCOPESIGNAL_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    #[arg(long, global = true, env = "SCOPESIGNAL_CACHE_TTL_SECS", default_value_t = 86_400)]
    cache_ttl_secs: u64,

    /// Total attempts per update, first call included.
    #[arg(long, global = true, env = "SCOPESIGNAL_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    #[arg(long, global = true, env = "SCOPESIGNAL_NO_CACHE")]
    no_cache: bool,

    #[arg(long, global = true, env = "SCOPESIGNAL_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Batch items in flight at once.
    #[arg(long, global = true, env = "SCOPESIGNAL_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,
}

impl Settings {
    fn config(&self) -> ClassifierConfig {
        ClassifierConfig {
            max_retries: self.max_retries,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            cache_enabled: !self.no_cache,
            cache_dir: self.cache_dir.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            batch_concurrency: self.concurrency,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            ..Default::default()
        }
    }

    fn classifier(&self) -> Result<Classifier> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            bail!("no API key: set SCOPESIGNAL_API_KEY or pass --api-key");
        };
        let config = self.config();
        let client = ChatClient::from_config(&config, api_key)?;
        Ok(Classifier::from_config(Arc::new(client), &config)?)
    }

    fn cache(&self) -> Result<ResultCache> {
        ResultCache::open_dir(&self.cache_dir, Duration::from_secs(self.cache_ttl_secs))
            .with_context(|| format!("opening cache at {}", self.cache_dir.display()))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a single project update.
    Classify {
        text: String,
        #[arg(long, short)]
        trade: Trade,
        /// Print the decision as JSON instead of a card.
        #[arg(long)]
        json: bool,
    },
    /// Classify every update in a JSON file.
    Batch {
        input: PathBuf,
        /// Write results here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Classify a labelled file and score the results against the labels.
    Evaluate {
        input: PathBuf,
        /// Also write the report and every outcome as JSON.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Inspect or empty the result cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    Stats,
    Clear,
}

/// Batch files are either a bare array or `{"updates": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Items(Vec<BatchItem>),
    Wrapped { updates: Vec<BatchItem> },
}

impl BatchFile {
    fn into_items(self) -> Vec<BatchItem> {
        match self {
            Self::Items(items) | Self::Wrapped { updates: items } => items,
        }
    }
}

#[derive(Serialize)]
struct EvaluationFile<'a> {
    summary: &'a EvaluationReport,
    results: &'a [BatchOutcome],
}

fn read_batch(path: &Path) -> Result<Vec<BatchItem>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading batch input {}", path.display()))?;
    let file: BatchFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing batch input {}", path.display()))?;
    Ok(file.into_items())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();
    info!("scopesignal v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Classify { text, trade, json } => {
            let classifier = cli.settings.classifier()?;
            let result = classifier.classify(&text, trade.as_str()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                display::print_decision_card(&result);
            }
        }
        Command::Batch { input, output } => {
            let items = read_batch(&input)?;
            let classifier = cli.settings.classifier()?;
            let outcomes = classifier.classify_batch(&items).await;
            let rendered = serde_json::to_string_pretty(&outcomes)?;
            match output {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{rendered}"),
            }
            display::print_batch_summary(&outcomes);
        }
        Command::Evaluate { input, output } => {
            let items = read_batch(&input)?;
            let labelled = items.iter().filter(|i| i.expected.is_some()).count();
            if labelled == 0 {
                bail!(
                    "{} has no labelled updates (set `expected` or `expected_classification`)",
                    input.display()
                );
            }
            let classifier = cli.settings.classifier()?;
            let outcomes = classifier.classify_batch(&items).await;
            let report = evaluate(&items, &outcomes);
            display::print_evaluation(&report);
            if let Some(path) = output {
                let file = EvaluationFile {
                    summary: &report,
                    results: &outcomes,
                };
                fs::write(&path, serde_json::to_string_pretty(&file)?)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
        Command::Cache { command } => {
            let cache = cli.settings.cache()?;
            match command {
                CacheCommand::Stats => display::print_cache_stats(&cache.stats()?),
                CacheCommand::Clear => {
                    let removed = cache.clear()?;
                    println!("Removed {removed} cached decision(s)");
                }
            }
        }
    }

    Ok(())
}
