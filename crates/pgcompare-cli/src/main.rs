//! pgcompare CLI - cross-platform database reconciliation.

use clap::{Parser, Subcommand};
use pgcompare::{
    discover, report, CompareError, Config, Reconciler, RepoPool, RunFilter, RunMode,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code when --fail-on-diff is given and out-of-sync rows remain.
const EXIT_OUT_OF_SYNC: u8 = 2;

#[derive(Parser)]
#[command(name = "pgcompare")]
#[command(about = "Cross-platform database reconciliation")]
#[command(version)]
struct Cli {
    /// Path to the properties configuration file
    #[arg(short, long, default_value = "pgcompare.properties")]
    config: PathBuf,

    /// Batch number to process (0 = all batches)
    #[arg(short, long, default_value = "0")]
    batch: i32,

    /// Override the active project id
    #[arg(short, long)]
    project: Option<i32>,

    /// Limit to the specified table alias
    #[arg(short, long)]
    table: Option<String>,

    /// Write an HTML report to this file
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Exit with code 2 when out-of-sync rows are reported (for CI)
    #[arg(long)]
    fail_on_diff: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the repository schema
    Init,

    /// Discover tables and build column maps for a schema
    Discover {
        /// Schema to scan on the target database
        schema: String,
    },

    /// Reconcile the registered tables
    Compare {
        /// Compile and persist column maps only; skip the data pass
        #[arg(long)]
        map_only: bool,
    },

    /// Re-read previously out-of-sync rows and confirm or clear them
    Check,

    /// Duplicate a table entry and its maps under a new alias
    CopyTable {
        /// Existing table alias
        from: String,
        /// Alias for the copy
        to: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CompareError> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(project) = cli.project {
        config.project = project;
    }

    setup_logging(&config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let requires_endpoints = !matches!(cli.command, Commands::Init | Commands::CopyTable { .. });
    config.validate(requires_endpoints)?;

    let config = Arc::new(config);
    let cancel = setup_signal_handler()?;

    let repo = RepoPool::connect(&config.repo, repo_pool_size(&config)).await?;

    match cli.command {
        Commands::Init => {
            repo.init_schema().await?;
            println!("Repository initialized");
        }

        Commands::Discover { schema } => {
            let count = discover::run_discovery(&config, &repo, &schema).await?;
            println!("Discovered {} tables in schema {}", count, schema);
        }

        Commands::Compare { map_only } => {
            let filter = RunFilter {
                batch_nbr: cli.batch,
                table: cli.table.clone(),
                map_only,
            };
            let reconciler = Reconciler::new(Arc::clone(&config), repo, cancel.clone());
            let summary = reconciler.run(RunMode::Compare, &filter).await?;

            if !map_only {
                report::log_run_summary(&summary);
                if let Some(path) = &cli.report {
                    report::write_report(path, &summary, RunMode::Compare)?;
                }
                if cli.fail_on_diff && summary.out_of_sync() > 0 {
                    return Ok(ExitCode::from(EXIT_OUT_OF_SYNC));
                }
            }
        }

        Commands::Check => {
            let filter = RunFilter {
                batch_nbr: cli.batch,
                table: cli.table.clone(),
                map_only: false,
            };
            let reconciler = Reconciler::new(Arc::clone(&config), repo, cancel.clone());
            let summary = reconciler.run(RunMode::Check, &filter).await?;

            report::log_run_summary(&summary);
            println!("outOfSync={}", summary.out_of_sync());
            if let Some(path) = &cli.report {
                report::write_report(path, &summary, RunMode::Check)?;
            }
            if cli.fail_on_diff && summary.out_of_sync() > 0 {
                return Ok(ExitCode::from(EXIT_OUT_OF_SYNC));
            }
        }

        Commands::CopyTable { from, to } => {
            let tid = repo.copy_table(config.project, &from, &to).await?;
            println!("Copied table '{}' to '{}' (tid {})", from, to, tid);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Repository connections: loaders for both sides plus the reconciler,
/// observer, and a little headroom.
fn repo_pool_size(config: &Config) -> usize {
    (config.loader_threads * 2 + 8).max(16)
}

fn setup_logging(config: &Config) -> Result<(), CompareError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| CompareError::config(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &config.log_destination {
        Some(path) if path != "stdout" => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        _ => builder.init(),
    }
    Ok(())
}

/// Wire SIGINT/SIGTERM to the cancellation token the workers watch.
fn setup_signal_handler() -> Result<CancellationToken, CompareError> {
    let cancel = CancellationToken::new();

    #[cfg(unix)]
    {
        let token = cancel.clone();
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
            warn!("Shutdown signal received; draining workers");
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Shutdown signal received; draining workers");
                token.cancel();
            }
        });
    }

    Ok(cancel)
}
