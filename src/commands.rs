use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::RemigrateError;
use crate::cli::TransferArgs;
use crate::config::Config;
use crate::ledger::{self, FailureRecord};
use crate::logs;
use crate::parse::FailureLogParser;
use crate::planner::{CoveringDirectory, MountPoints, RemigrationPlanner};
use crate::probe::{LocalFs, PathProbe};
use crate::transfer::{
    MsrsyncRunner, RemigrationOrchestrator, RunReport, TransferConfig, TransferRunner,
    posix_path, resolve_executable,
};
use crate::validate::{ValidationService, ValidationSummary};

/// Files a run reads and writes, resolved against the working directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub ledger: PathBuf,
    pub timesheet: PathBuf,
    pub stats_dir: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl RunPaths {
    pub fn resolve(config: &Config, cwd: &Path) -> Self {
        RunPaths {
            ledger: Config::resolve(cwd, &config.ledger_file),
            timesheet: Config::resolve(cwd, &config.timesheet_file),
            stats_dir: Config::resolve(cwd, &config.stats_dir),
            stdout_log: Config::resolve(cwd, &config.stdout_log),
            stderr_log: Config::resolve(cwd, &config.stderr_log),
        }
    }
}

fn transfer_config(config: &Config, paths: &RunPaths, args: &TransferArgs) -> Result<TransferConfig> {
    let executable = resolve_executable(&config.msrsync_path)?;
    Ok(TransferConfig {
        executable,
        workers: args.workers.unwrap_or(config.workers),
        stats_dir: paths.stats_dir.clone(),
        rsync_flags: args.rsync_flags.clone(),
        stdout_log: paths.stdout_log.clone(),
        stderr_log: paths.stderr_log.clone(),
    })
}

fn prepare_stats(paths: &RunPaths, cwd: &Path, purge: bool) -> Result<()> {
    if logs::ensure_stats_dir(&paths.stats_dir)? {
        println!("📁 已创建日志目录: {}", paths.stats_dir.display());
    }
    if purge && let Some(old) = logs::purge_bucket_dir(cwd)? {
        println!("🧹 已删除旧的 msrsync 日志目录: {}", old.display());
    }
    Ok(())
}

/// `sync`: one msrsync run over the whole tree, timing recorded.
pub fn handle_sync(config: &Config, cwd: &Path, args: TransferArgs) -> Result<()> {
    let paths = RunPaths::resolve(config, cwd);
    tracing::info!("sync mode: {} -> {}", args.source, args.destination);
    let tcfg = transfer_config(config, &paths, &args)?;
    prepare_stats(&paths, cwd, args.purge_old_logs)?;
    let pair = CoveringDirectory {
        source: posix_path(&args.source),
        destination: posix_path(&args.destination),
    };
    println!("🚚 msrsync: {} -> {}", pair.source, pair.destination);
    let mut orchestrator = RemigrationOrchestrator::new(MsrsyncRunner::new(tcfg), paths.timesheet.clone());
    let (timing, outcome) = orchestrator.sync_pair(&pair)?;
    if outcome.success() {
        println!("✅ 同步完成，耗时 {} 分钟", timing.duration_minutes());
    } else {
        println!(
            "⚠️ msrsync 退出码 {:?}，部分文件可能失败；可运行 generate-logs 生成失败清单",
            outcome.exit_code
        );
    }
    println!("⏱️  计时记录: {}", paths.timesheet.display());
    Ok(())
}

/// `generate-logs`: parse the previous run's rsync logs into a fresh ledger.
/// Returns the number of failed files written.
pub fn handle_generate_logs(config: &Config, cwd: &Path) -> Result<usize> {
    let paths = RunPaths::resolve(config, cwd);
    let bucket = match logs::find_bucket_dir(cwd) {
        Ok(dir) => dir,
        Err(e @ RemigrateError::StatsDirNotFound(_)) => {
            tracing::warn!("{}", e);
            eprintln!("⚠️ {}，请确认 logs 目录未被清理", e);
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };
    let files = logs::collect_log_files(&bucket);
    if files.is_empty() {
        tracing::warn!("no *.log files in {}", bucket.display());
        eprintln!("⚠️ 目录中没有 *.log 文件: {}", bucket.display());
        return Ok(0);
    }
    let failures = FailureLogParser::default().parse_files(&files)?;
    if failures.is_empty() {
        tracing::warn!("no files failed during migration");
        println!("✅ 迁移过程中没有失败的文件");
        return Ok(0);
    }
    for (path, kind) in failures.iter() {
        tracing::info!("failed: {} ({})", path, kind);
    }
    let records = failures.into_records();
    ledger::save(&paths.ledger, &records)?;
    println!("📝 已生成失败清单: {} ({} 个文件)", paths.ledger.display(), records.len());
    Ok(records.len())
}

#[derive(Debug, Clone)]
pub struct RemigrationOutcome {
    pub plan: Vec<CoveringDirectory>,
    pub report: RunReport,
    pub summary: ValidationSummary,
}

/// Plan → orchestrate → validate over an already reset ledger.
pub fn run_remigration<R, P>(
    paths: &RunPaths,
    mounts: MountPoints,
    records: &[FailureRecord],
    runner: R,
    probe: P,
) -> Result<RemigrationOutcome>
where
    R: TransferRunner,
    P: PathProbe,
{
    let planner = RemigrationPlanner::new(mounts.clone(), &probe);
    let plan = planner.plan(records)?;
    if plan.is_empty() {
        println!("✅ 失败清单为空，无需重新同步");
    } else {
        println!("🔁 需要重新同步 {} 个目录 ({} 个失败文件):", plan.len(), records.len());
        crate::util::print_plan(&plan)?;
    }

    let mut orchestrator = RemigrationOrchestrator::new(runner, paths.timesheet.clone());
    let report = orchestrator.run(&plan)?;
    crate::util::print_run_summary(&report);

    let summary = ValidationService::new(mounts, &probe).validate_ledger(&paths.ledger)?;
    crate::util::print_validation_summary(&summary);
    Ok(RemigrationOutcome { plan, report, summary })
}

/// `remigrate`: reset the ledger, re-sync covering directories, re-validate.
pub fn handle_remigrate(config: &Config, cwd: &Path, args: TransferArgs) -> Result<()> {
    let paths = RunPaths::resolve(config, cwd);
    tracing::info!(
        "remigrate mode: {} -> {} (rsync flags: {})",
        args.source,
        args.destination,
        args.rsync_flags
    );
    // 先确认 msrsync 可用，再改写失败清单 — the ledger is only reset once the tool is known to exist
    let tcfg = transfer_config(config, &paths, &args)?;
    prepare_stats(&paths, cwd, args.purge_old_logs)?;
    let records = ledger::reset_for_remigration(&paths.ledger)?;
    let mounts = MountPoints::new(&args.source, &args.destination);
    run_remigration(&paths, mounts, &records, MsrsyncRunner::new(tcfg), LocalFs)?;
    println!("📋 失败清单已更新: {}", paths.ledger.display());
    Ok(())
}

/// `set`: update and persist tool settings.
pub fn handle_set(
    config: &Config,
    msrsync: Option<PathBuf>,
    workers: Option<usize>,
    stats_dir: Option<PathBuf>,
) -> Result<Config> {
    let mut cfg = config.clone();
    if let Some(m) = msrsync {
        cfg.msrsync_path = m;
    }
    if let Some(w) = workers {
        if w == 0 {
            anyhow::bail!("worker 数量必须大于 0");
        }
        cfg.workers = w;
    }
    if let Some(s) = stats_dir {
        cfg.stats_dir = s;
    }
    cfg.save_to_storage().context("保存配置失败")?;
    println!("✅ 配置已更新");
    Ok(cfg)
}
