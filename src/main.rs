
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use load_test::{LoadTestConfig, run_load_test};
use scopetree::{LifecycleEvent, ManualAdapter, ScopeConfig, ScopeId, ScopeStore};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scopetree")]
#[command(about = "Replay and stress tooling for the scope tree store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a JSON-lines file of lifecycle events and report the final tree
    Replay {
        file: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        capacity: usize,
        /// 0 disables purging
        #[arg(long, default_value_t = 600_000)]
        ttl_ms: u64,
        #[arg(long, default_value_t = 300_000)]
        purge_interval_ms: u64,
        /// Print the lineage of these scope ids after the replay
        #[arg(long)]
        lineage: Vec<u64>,
    },
    /// Build, read and tear down a synthetic scope tree
    LoadTest {
        #[arg(long, default_value_t = 100_000)]
        scopes: usize,
        #[arg(long, default_value_t = 4)]
        fanout: usize,
        #[arg(long, default_value_t = 10_000)]
        capacity: usize,
        #[arg(long, default_value_t = 4)]
        reads_per_scope: usize,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            file,
            capacity,
            ttl_ms,
            purge_interval_ms,
            lineage,
        } => {
            let config = ScopeConfig::new()
                .capacity(capacity)
                .ttl(Duration::from_millis(ttl_ms))
                .purge_interval(Duration::from_millis(purge_interval_ms));
            replay(&file, config, &lineage)
        }
        Command::LoadTest {
            scopes,
            fanout,
            capacity,
            reads_per_scope,
        } => run_load_test(LoadTestConfig {
            scopes,
            fanout,
            capacity,
            reads_per_scope,
        }),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn replay(path: &Path, config: ScopeConfig, lineage: &[u64]) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let mut store = ScopeStore::new(config, ManualAdapter::new())?;

    let mut applied = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<LifecycleEvent>(trimmed) {
            Ok(event) => {
                store.apply(event);
                applied += 1;
            }
            Err(err) => warn!(line = line_no + 1, error = %err, "skipping malformed event"),
        }
    }
    info!(events = applied, "replay finished");

    store
        .check_invariants()
        .context("Tree invariants violated after replay")?;

    println!("size: {}", serde_json::to_string(&store.size())?);
    println!("stats: {}", serde_json::to_string(&store.stats())?);
    for raw in lineage {
        let chain = store
            .lineage_of(ScopeId(*raw))
            .iter()
            .map(|id| id.as_u64().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        println!("lineage({}): {}", raw, chain);
    }

    Ok(())
}
