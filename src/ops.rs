use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Ensure `~/.remigrator` exists and return it.
pub fn ensure_app_dir(home_dir: &Path) -> Result<PathBuf> {
    let app_dir = home_dir.join(".".to_owned() + env!("CARGO_PKG_NAME"));
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)
            .with_context(|| format!("无法创建配置目录: {}", app_dir.display()))?;
    }
    Ok(app_dir)
}

/// File logging in append mode. `RUST_LOG` wins over `--logging-level` when set.
/// The returned guard flushes the background writer when dropped, so `main`
/// keeps it alive until exit.
pub fn init_logging(level: LogLevel, log_file: &Path) -> Result<WorkerGuard> {
    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = log_file
        .file_name()
        .with_context(|| format!("日志文件路径无效: {}", log_file.display()))?;
    let appender = tracing_appender::rolling::never(&dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("日志初始化失败: {}", e))?;
    Ok(guard)
}
