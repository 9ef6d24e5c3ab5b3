//! dirscout - directory collection and enrichment pipeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dirscout_common::checkpoint::Namespace;
use dirscout_common::logging::{init_logging, LogConfig, LogLevel};
use dirscout_ingest::{Pipeline, PipelineConfig, RunOptions, Stage};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dirscout")]
#[command(author, version, about = "Collect directory entities and enrich them from the company registry")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Sources file declaring the directory adapters
    #[arg(long, global = true, env = "DIRSCOUT_SOURCES_FILE")]
    sources: Option<PathBuf>,

    /// Root of the checkpoint directories
    #[arg(long, global = true, env = "DIRSCOUT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Root of the CSV exports
    #[arg(long, global = true, env = "DIRSCOUT_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline for a source, resuming from its checkpoints
    Run {
        /// Source name as declared in the sources file
        source: String,

        /// Use the isolated trial checkpoints
        #[arg(long)]
        trial: bool,

        /// Last stage to run
        #[arg(long, value_enum, default_value_t = Stage::Export)]
        until: Stage,

        /// Only process the first N listed entities
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write the CSV export from the current checkpoints
    Export {
        source: String,

        #[arg(long)]
        trial: bool,
    },

    /// Show per-stage checkpoint counts
    Status {
        source: String,

        #[arg(long)]
        trial: bool,
    },

    /// List configured sources
    Sources,
}

fn namespace(trial: bool) -> Namespace {
    if trial {
        Namespace::Trial
    } else {
        Namespace::Live
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    // LOG_* variables take precedence over --verbose
    let log_config = LogConfig::new(log_level)
        .with_env_overrides()
        .unwrap_or_else(|e| {
            eprintln!("Warning: ignoring logging environment: {}", e);
            LogConfig::new(log_level)
        });
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    if let Err(e) = execute(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = cli.sources {
        config.sources_file = path;
    }
    if let Some(path) = cli.data_dir {
        config.data_dir = path;
    }
    if let Some(path) = cli.export_dir {
        config.export_dir = path;
    }
    if cli.no_progress {
        config.show_progress = false;
    }

    let pipeline = Pipeline::from_config(config)?;

    match cli.command {
        Command::Run {
            source,
            trial,
            until,
            limit,
        } => {
            let options = RunOptions {
                namespace: namespace(trial),
                until,
                limit,
            };
            let summary = pipeline.run(&source, options).await?;
            for report in &summary.reports {
                println!(
                    "{:<10} processed={} ok={} failed={} skipped={} written={}",
                    report.stage,
                    report.processed,
                    report.succeeded,
                    report.failed,
                    report.skipped,
                    report.written
                );
            }
            info!(source = %source, trial, "Run complete");
        }
        Command::Export { source, trial } => {
            let report = pipeline.export(&source, namespace(trial))?;
            println!(
                "Exported {} entities to {}",
                report.processed,
                pipeline.config().export_dir.display()
            );
        }
        Command::Status { source, trial } => {
            for (stage, count) in pipeline.status(&source, namespace(trial))? {
                println!("{:<10} {}", stage, count);
            }
        }
        Command::Sources => {
            for name in pipeline.adapters().names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
