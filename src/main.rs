use clap::Parser;

use remigrator::RemigrateError;
use remigrator::cli::{Cli, Commands};
use remigrator::commands;
use remigrator::config::Config;
use remigrator::ops;

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::init();
    let cwd = std::env::current_dir()?;
    let log_file = Config::resolve(&cwd, &config.log_file);
    // guard 必须活到进程结束，否则缓冲的日志会丢失 — keep the guard until exit
    let _guard = ops::init_logging(cli.logging_level, &log_file)?;
    tracing::info!("{} {} started in {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), cwd.display());

    match cli.command {
        Commands::Sync(args) => commands::handle_sync(&config, &cwd, args),
        Commands::Remigrate(args) => commands::handle_remigrate(&config, &cwd, args),
        Commands::GenerateLogs {} => commands::handle_generate_logs(&config, &cwd).map(|_| ()),
        Commands::Set { msrsync, workers, stats_dir } => {
            commands::handle_set(&config, msrsync, workers, stats_dir).map(|_| ())
        }
    }
}

/// Print the error and pick the exit code.
fn report(e: &anyhow::Error) -> i32 {
    tracing::error!("{:#}", e);
    match e.downcast_ref::<RemigrateError>() {
        Some(err) if !err.is_fatal() => {
            eprintln!("⚠️ [{}] {}", err.class(), err);
            0
        }
        Some(err) => {
            eprintln!("❌ [{}] {}", err.class(), err);
            1
        }
        None => {
            eprintln!("❌ {:#}", e);
            1
        }
    }
}
