//! augur CLI: run ledger and graph-diff for causal decision graphs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use augur::bands::{extract_bands, format_value};
use augur::config::AugurConfig;
use augur::diff::{DEFAULT_DELTA_LIMIT, compute_edge_deltas, diff_snapshots};
use augur::error::LedgerError;
use augur::ledger::RunLedger;
use augur::model::{GraphSnapshot, RunRecord};
use augur::scenario::{Scenario, ScenarioGuard};
use augur::store::{KeyValueStore, MemKvStore, RedbKvStore};

#[derive(Parser)]
#[command(
    name = "augur",
    version,
    about = "Run ledger and graph-diff for causal decision graphs"
)]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List and inspect recorded analysis runs.
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Compare two runs: ranked edge deltas plus structural changes.
    Compare {
        /// Earlier run id.
        id_a: String,
        /// Later run id.
        id_b: String,
        /// Maximum ranked rows to show.
        #[arg(long, default_value_t = DEFAULT_DELTA_LIMIT)]
        limit: usize,
    },

    /// Show the formatted outcome bands of a run.
    Bands {
        /// Run id.
        id: String,
    },

    /// Manage saved scenarios.
    Scenarios {
        #[command(subcommand)]
        action: ScenariosAction,
    },

    /// Report storage quota health.
    Health,
}

#[derive(Subcommand)]
enum RunsAction {
    /// List all recorded runs, most recent first.
    List,
    /// Show one run as JSON.
    Show {
        /// Run id.
        id: String,
    },
    /// Record a run from a JSON file.
    Import {
        /// Path to a JSON run record.
        file: PathBuf,
    },
    /// Toggle a run's pin flag.
    Pin {
        /// Run id.
        id: String,
    },
    /// Delete a run, pinned or not.
    Delete {
        /// Run id.
        id: String,
    },
}

#[derive(Subcommand)]
enum ScenariosAction {
    /// Save scenarios from a JSON document ({"scenarios": [...], "currentScenarioId": ...}).
    Save {
        /// Path to the JSON document.
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // hook may already be installed when running under a test harness

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AugurConfig::load(path)?,
        None => AugurConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }

    let store: Arc<dyn KeyValueStore> = match &config.data_dir {
        Some(dir) => Arc::new(RedbKvStore::open_with_capacity(
            dir,
            config.store_capacity_bytes,
        )?),
        None => Arc::new(MemKvStore::with_capacity(config.store_capacity_bytes)),
    };

    let ledger = RunLedger::open(Arc::clone(&store), config.retention());

    match cli.command {
        Commands::Runs { action } => run_runs(&ledger, action),
        Commands::Compare { id_a, id_b, limit } => run_compare(&ledger, &id_a, &id_b, limit),
        Commands::Bands { id } => run_bands(&ledger, &id),
        Commands::Scenarios { action } => {
            let guard = ScenarioGuard::new(store, config.export_dir.clone());
            run_scenarios(&guard, action)
        }
        Commands::Health => {
            let guard = ScenarioGuard::new(store, config.export_dir.clone());
            run_health(&guard)
        }
    }
}

fn fetch(ledger: &RunLedger, id: &str) -> Result<RunRecord> {
    ledger
        .get(id)
        .ok_or_else(|| LedgerError::RunNotFound { id: id.to_string() }.into())
}

fn run_runs(ledger: &RunLedger, action: RunsAction) -> Result<()> {
    match action {
        RunsAction::List => {
            let records = ledger.list();
            if records.is_empty() {
                println!("no runs recorded");
                return Ok(());
            }
            println!(
                "{:<28} {:<14} {:<10} {:<6} {}",
                "ID", "CREATED", "SEED", "PIN", "SUMMARY"
            );
            for r in records {
                let pin = if r.is_pinned { "yes" } else { "" };
                let mut summary = r.summary.clone().unwrap_or_default();
                if let Some(count) = r.duplicate_count {
                    summary = format!("{summary} (x{count})");
                }
                println!(
                    "{:<28} {:<14} {:<10} {:<6} {}",
                    r.id, r.created_at, r.seed, pin, summary
                );
            }
        }
        RunsAction::Show { id } => {
            let record = fetch(ledger, &id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record).into_diagnostic()?
            );
        }
        RunsAction::Import { file } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let record: RunRecord = serde_json::from_str(&content).into_diagnostic()?;
            let id = record.id.clone();
            let outcome = ledger.add(record)?;
            if outcome.merged {
                println!("merged into an existing run (identical content hash)");
            } else {
                println!("recorded {id}");
            }
        }
        RunsAction::Pin { id } => {
            let pinned = ledger.toggle_pin(&id)?;
            println!("{id}: {}", if pinned { "pinned" } else { "unpinned" });
        }
        RunsAction::Delete { id } => {
            if ledger.delete(&id)? {
                println!("deleted {id}");
            } else {
                println!("no run with id {id}");
            }
        }
    }
    Ok(())
}

fn run_compare(ledger: &RunLedger, id_a: &str, id_b: &str, limit: usize) -> Result<()> {
    let run_a = fetch(ledger, id_a)?;
    let run_b = fetch(ledger, id_b)?;

    let empty = GraphSnapshot::default();
    let snap_a = run_a.graph_snapshot.as_ref().unwrap_or(&empty);
    let snap_b = run_b.graph_snapshot.as_ref().unwrap_or(&empty);
    let diff = diff_snapshots(snap_a, snap_b);

    println!(
        "nodes: +{} -{} ~{}    edges: +{} -{} ~{}",
        diff.nodes.added.len(),
        diff.nodes.removed.len(),
        diff.nodes.modified.len(),
        diff.edges.added.len(),
        diff.edges.removed.len(),
        diff.edges.modified.len(),
    );

    let rows = compute_edge_deltas(&run_a, &run_b, limit);
    if rows.is_empty() {
        println!("no edges to compare");
        return Ok(());
    }
    println!();
    println!(
        "{:<6} {:<20} {:<10} {:>12} {:>12}",
        "RANK", "EDGE", "STATUS", "Δ WEIGHT", "Δ BELIEF"
    );
    for row in rows {
        println!(
            "{:<6} {:<20} {:<10} {:>12.3} {:>12.3}",
            row.rank, row.id, row.status, row.delta_weight, row.delta_belief
        );
    }
    Ok(())
}

fn run_bands(ledger: &RunLedger, id: &str) -> Result<()> {
    let record = fetch(ledger, id)?;
    let Some(bands) = extract_bands(&record) else {
        println!("run {id} has no result payload");
        return Ok(());
    };

    let units = bands.units_or_default();
    let symbol = bands.unit_symbol.as_deref();
    println!("p10: {}", format_value(bands.p10, units, symbol));
    println!("p50: {}", format_value(bands.p50, units, symbol));
    println!("p90: {}", format_value(bands.p90, units, symbol));
    Ok(())
}

fn run_scenarios(guard: &ScenarioGuard, action: ScenariosAction) -> Result<()> {
    match action {
        ScenariosAction::Save { file } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let doc: serde_json::Value = serde_json::from_str(&content).into_diagnostic()?;
            let scenarios: Vec<Scenario> = doc
                .get("scenarios")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .into_diagnostic()?
                .unwrap_or_default();
            let current = doc.get("currentScenarioId").and_then(|v| v.as_str());

            let outcome = guard.save_scenarios(&scenarios, current)?;
            if outcome.quota_exceeded {
                match outcome.export_path {
                    Some(path) => println!(
                        "storage quota exceeded; exported scenarios to {}",
                        path.display()
                    ),
                    None => println!("storage quota exceeded"),
                }
            } else {
                println!("saved {} scenario(s)", scenarios.len());
            }
        }
    }
    Ok(())
}

fn run_health(guard: &ScenarioGuard) -> Result<()> {
    let health = guard.check_storage_health();
    let pct = health
        .percentage
        .map(|p| format!("{p:.0}%"))
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "storage: {} ({} used)",
        if health.healthy { "healthy" } else { "UNHEALTHY" },
        pct
    );
    for warning in &health.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}
