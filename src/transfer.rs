// transfer module: sequential orchestration of the external bulk-transfer tool
mod helpers;
mod msrsync;

use std::path::{Path, PathBuf};

use chrono::Local;

pub use helpers::{posix_path, rsync_flag_arg, source_dir_arg};
pub use msrsync::{MsrsyncRunner, build_args};

use crate::RemigrateError;
use crate::ledger::{self, SyncTiming};
use crate::planner::CoveringDirectory;

/// Everything needed to launch the transfer tool. Passed by value into the
/// runner; nothing is read from globals or environment at invocation time.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub executable: PathBuf,
    pub workers: usize,
    /// msrsync bucket/statistics directory (`--buckets`)
    pub stats_dir: PathBuf,
    /// Low-level rsync flags handed through `--rsync`
    pub rsync_flags: String,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl TransferOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One blocking transfer of `source` into `destination`.
///
/// `Err` is reserved for failures that prevent the tool from running at all;
/// a tool that ran and reported file-level failures returns `Ok` with a non-zero
/// exit code.
pub trait TransferRunner {
    fn run(&mut self, source: &str, destination: &str) -> Result<TransferOutcome, RemigrateError>;
}

impl<R: TransferRunner + ?Sized> TransferRunner for &mut R {
    fn run(&mut self, source: &str, destination: &str) -> Result<TransferOutcome, RemigrateError> {
        (**self).run(source, destination)
    }
}

/// Locate the transfer executable: explicit paths are used as-is, bare names
/// are looked up on PATH.
pub fn resolve_executable(configured: &Path) -> Result<PathBuf, RemigrateError> {
    if configured.components().count() > 1 {
        return if configured.exists() {
            Ok(configured.to_path_buf())
        } else {
            Err(RemigrateError::ExecutableNotFound(configured.display().to_string()))
        };
    }
    which::which(configured)
        .map_err(|_| RemigrateError::ExecutableNotFound(configured.display().to_string()))
}

#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub timings: Vec<SyncTiming>,
    /// Pairs whose invocation ended with a non-zero exit.
    pub failed: Vec<(CoveringDirectory, Option<i32>)>,
}

impl RunReport {
    pub fn total_minutes(&self) -> f64 {
        self.timings.iter().map(SyncTiming::duration_minutes).sum()
    }
}

/// Drives the runner over the covering directories one at a time.
pub struct RemigrationOrchestrator<R: TransferRunner> {
    runner: R,
    timesheet: PathBuf,
}

impl<R: TransferRunner> RemigrationOrchestrator<R> {
    pub fn new(runner: R, timesheet: PathBuf) -> Self {
        Self { runner, timesheet }
    }

    /// Sync one pair and record its timing row.
    pub fn sync_pair(&mut self, pair: &CoveringDirectory) -> Result<(SyncTiming, TransferOutcome), RemigrateError> {
        let start_time = Local::now();
        let outcome = self.runner.run(&pair.source, &pair.destination)?;
        let end_time = Local::now();
        let timing = SyncTiming {
            source: pair.source.clone(),
            destination: pair.destination.clone(),
            start_time,
            end_time,
        };
        // 计时表仅用于记录，写入失败不影响后续目录 — the timesheet is a record only
        if let Err(e) = ledger::append_timing(&self.timesheet, &timing) {
            tracing::warn!("[transfer] timing row not written: {}", e);
        }
        Ok((timing, outcome))
    }

    /// Run every pair in order. A non-zero exit is logged and the queue moves on;
    /// only a runner error (tool could not be started) stops the run.
    pub fn run(&mut self, pairs: &[CoveringDirectory]) -> Result<RunReport, RemigrateError> {
        let mut report = RunReport::default();
        for (idx, pair) in pairs.iter().enumerate() {
            tracing::info!(
                "[transfer] ({}/{}) {} -> {}",
                idx + 1,
                pairs.len(),
                pair.source,
                pair.destination
            );
            let (timing, outcome) = self.sync_pair(pair)?;
            if !outcome.success() {
                tracing::warn!(
                    "[transfer] {} -> {} exited with {:?}, continuing",
                    pair.source,
                    pair.destination,
                    outcome.exit_code
                );
                report.failed.push((pair.clone(), outcome.exit_code));
            }
            tracing::info!("[transfer] took {} min", timing.duration_minutes());
            report.timings.push(timing);
        }
        Ok(report)
    }
}
