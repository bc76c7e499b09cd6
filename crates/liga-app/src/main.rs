// `liga` entry point.
//
// 1. Parse arguments
// 2. Load config (copying defaults on first run) and open the database
// 3. Initialize tracing: file for `run`, stderr otherwise
// 4. Execute the command, or run the scheduler until Ctrl+C

use anyhow::Context;
use clap::Parser;
use liga_app::cli::{Cli, Command};
use liga_app::{commands, logging, scheduler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let base_dir = cli
        .base_dir
        .canonicalize()
        .with_context(|| format!("base directory {} not found", cli.base_dir.display()))?;

    let config = commands::load_config(&base_dir)?;

    if cli.command == Command::Run {
        let log_path = logging::init_file(&logging::log_dir(&base_dir, &config))?;
        eprintln!("Logging to {}", log_path.display());
    } else {
        logging::init_stderr()?;
    }
    info!(league = %config.league.name, "Config loaded");

    let db = commands::open_database(&base_dir, &config)?;

    if cli.command == Command::Run {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        let stats = scheduler::run(&db, &config, StdRng::from_os_rng(), shutdown).await;
        println!(
            "Scheduler stopped after {} settle and {} freeze cycles ({} failed jobs)",
            stats.settle_cycles, stats.freeze_cycles, stats.failed_jobs
        );
        return Ok(());
    }

    let output = commands::execute(&cli.command, &db, &config)?;
    println!("{}", output.trim_end());
    Ok(())
}
