//! genflow CLI - genetic string optimization over a record store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genflow_core::{fields, RecordId};
use genflow_execution::{bootstrap_run, find_master, load_master, EngineConfig, WorkerPool};
use genflow_storage::{JobStore, JsonJobStore, RecordFilter};
use sha2::{Digest, Sha256};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_GOAL: &str = "Hello, World!";
const DEFAULT_SEED: u64 = 42;
const CONFIG_ARTIFACT: &str = "config";

#[derive(Parser)]
#[command(name = "genflow")]
#[command(about = "Genetic string optimization over a record store", long_about = None)]
struct Cli {
    /// Store directory
    #[arg(long, global = true, default_value = ".genflow")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a run and its initial population
    Init {
        /// Number of candidates per generation
        psize: usize,
        /// Random seed; non-numeric seeds are hashed
        #[arg(long, short)]
        seed: Option<String>,
        /// Target string
        #[arg(long, default_value = DEFAULT_GOAL)]
        goal: String,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run workers until the run terminates
    Run {
        /// Concurrent workers
        #[arg(long)]
        workers: Option<usize>,
        /// Max passes per worker
        #[arg(long)]
        passes: Option<usize>,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show run status
    Status,
    /// List candidates of a generation
    List {
        /// Generation (defaults to the current one)
        #[arg(long)]
        generation: Option<u64>,
    },
    /// Show one record
    Show {
        /// Record ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn JobStore> = Arc::new(
        JsonJobStore::new(&cli.store)
            .await
            .with_context(|| format!("opening store at {}", cli.store.display()))?,
    );

    match cli.command {
        Commands::Init { psize, seed, goal, config } => {
            let seed = seed.as_deref().map(parse_seed).unwrap_or(DEFAULT_SEED);
            let config = load_config(store.as_ref(), config, false)
                .await?
                .with_population_size(psize);

            let id = bootstrap_run(store.as_ref(), &goal, seed, &config).await?;
            store
                .save_artifact(CONFIG_ARTIFACT, &serde_json::to_value(&config)?)
                .await?;
            println!("Initialized run {} (goal {:?}, seed {}, population {})", id, goal, seed, psize);
        }
        Commands::Run { workers, passes, config } => {
            let mut config = load_config(store.as_ref(), config, true).await?;
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            if let Some(passes) = passes {
                config = config.with_max_passes(passes);
            }
            config.validate()?;

            let id = find_master(store.as_ref()).await?;
            let pool = WorkerPool::new(store.clone(), config.clone(), id);
            let summary = pool.run(config.workers).await?;
            info!("Completed {} passes", summary.passes);

            println!("Generation: {}", summary.generation);
            println!("  Costs evaluated: {}", summary.evaluated);
            if summary.failed > 0 {
                println!("  Failed evaluations: {}", summary.failed);
            }
            println!("  Terminated: {}", summary.terminated);
            println!("  Optimized: {}", summary.optimized);
        }
        Commands::Status => {
            let id = find_master(store.as_ref()).await?;
            let master = load_master(store.as_ref(), &id).await?;
            let generation = master.generation();

            let candidates = store.find_records(&RecordFilter::candidates()).await?;
            let current = store
                .find_records(&RecordFilter::candidates().eq(fields::GENERATION_INDEX, generation))
                .await?;
            let costs: Vec<(u64, &str)> = current
                .iter()
                .filter_map(|r| {
                    let cost = r.candidate().ok()?.cost?;
                    Some((cost, r.state_point.code()))
                })
                .collect();

            println!("genflow Status");
            println!("  Goal: {:?} (seed {})", master.state_point.goal, master.state_point.seed);
            println!("  Generation: {}", generation);
            println!("  Optimized: {}", master.state.is_optimized());
            println!("  Ranked: {}", master.state.generation.pending_rank_map.is_some());
            println!("  Candidates stored: {}", candidates.len());
            println!("  Current generation: {} ({} costed)", current.len(), costs.len());
            if let Some((cost, code)) = costs.iter().min() {
                println!("  Best: {:?} (cost {})", code, cost);
            }
        }
        Commands::List { generation } => {
            let generation = match generation {
                Some(g) => g,
                None => {
                    let id = find_master(store.as_ref()).await?;
                    load_master(store.as_ref(), &id).await?.generation()
                }
            };
            let records = store
                .find_records(&RecordFilter::candidates().eq(fields::GENERATION_INDEX, generation))
                .await?;

            println!("Generation {} ({})", generation, records.len());
            for record in records {
                let candidate = record.candidate()?;
                println!(
                    "  {} | {} | {} | {:?}",
                    record.id,
                    format_field(candidate.cost),
                    format_field(candidate.rank),
                    record.state_point.code(),
                );
            }
        }
        Commands::Show { id } => {
            let id: RecordId = id.parse().context("Invalid record ID")?;
            let Some(record) = store.open_record(&id).await? else {
                println!("Record not found");
                return Ok(());
            };

            println!("Record: {}", record.id);
            println!("  Version: {}", record.version);
            println!("  State point: {}", serde_json::to_string(&record.state_point)?);
            println!("  Document: {}", serde_json::to_string_pretty(&record.document)?);
        }
    }

    Ok(())
}

/// Config from a file, else the one saved with the run, else defaults.
async fn load_config(store: &dyn JobStore, path: Option<PathBuf>, use_saved: bool) -> Result<EngineConfig> {
    if let Some(path) = path {
        return EngineConfig::load(&path).with_context(|| format!("loading {}", path.display()));
    }
    if use_saved {
        if let Some(saved) = store.load_artifact(CONFIG_ARTIFACT).await? {
            return Ok(serde_json::from_value(saved)?);
        }
    }
    Ok(EngineConfig::default())
}

/// Integer seeds are taken as-is; anything else hashes to a seed below 10^8.
fn parse_seed(seed: &str) -> u64 {
    seed.parse().unwrap_or_else(|_| {
        Sha256::digest(seed.as_bytes())
            .iter()
            .fold(0, |acc, byte| (acc * 256 + u64::from(*byte)) % 100_000_000)
    })
}

fn format_field(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
