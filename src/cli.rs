use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(
        long = "logging-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Log level for rfsync.log (RUST_LOG overrides)"
    )]
    pub logging_level: LogLevel,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    #[clap(long, help = "Source folder (mount point) to migrate from")]
    pub source: String,
    #[clap(long, help = "Destination folder (mount point) to migrate into")]
    pub destination: String,
    #[clap(
        long = "rsync-flags",
        alias = "rsync_flags",
        allow_hyphen_values = true,
        help = "Flags for msrsync's rsync workers, e.g. aHAX"
    )]
    pub rsync_flags: String,
    #[clap(short = 'p', long, help = "Override the configured msrsync worker count")]
    pub workers: Option<usize>,
    #[clap(long = "purge-old-logs", help = "Remove the msrsync bucket directory of a previous run first")]
    pub purge_old_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(about = "Run a one-shot msrsync between source and destination and record its timing", display_order = 1)]
    Sync(TransferArgs),
    #[clap(
        about = "Re-sync only the directories holding files listed in FAILED_LOGS.csv, then re-validate them",
        display_order = 2
    )]
    Remigrate(TransferArgs),
    #[clap(
        about = "Build FAILED_LOGS.csv from the msrsync logs of a previous run (transfers nothing)",
        display_order = 3
    )]
    GenerateLogs {},
    #[clap(about = "Configure remigrator", display_order = 4)]
    Set {
        #[clap(long, help = "Set the msrsync executable")]
        msrsync: Option<PathBuf>,
        #[clap(short = 'p', long, help = "Set the default worker count")]
        workers: Option<usize>,
        #[clap(long = "stats-dir", help = "Set the msrsync bucket/statistics directory")]
        stats_dir: Option<PathBuf>,
    },
}
