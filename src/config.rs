use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// msrsync executable; a bare name is resolved on PATH
    pub msrsync_path: PathBuf,
    pub workers: usize,
    // 相对路径均相对于当前工作目录 — relative paths are relative to the working directory
    pub stats_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub timesheet_file: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    pub log_file: PathBuf,
    pub version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            msrsync_path: PathBuf::from("msrsync"),
            workers: 14,
            stats_dir: PathBuf::from("logs"),
            ledger_file: PathBuf::from("FAILED_LOGS.csv"),
            timesheet_file: PathBuf::from("timesheet.csv"),
            stdout_log: PathBuf::from("msrsync_out.txt"),
            stderr_log: PathBuf::from("msrsync_err.txt"),
            log_file: PathBuf::from("rfsync.log"),
            version: Some(CONFIG_VERSION),
        }
    }
}

impl Config {
    /// `~/.remigrator/config.json`, written with defaults on first use.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("无法找到用户主目录")?;
        let dir = crate::ops::ensure_app_dir(&home)?;
        Ok(dir.join("config.json"))
    }

    pub fn init() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load_or_create(&path),
            Err(e) => {
                eprintln!("⚠️ {}，使用默认配置", e);
                Config::default()
            }
        }
    }

    /// Read the config at `path`; create it with defaults when absent. A broken
    /// file falls back to defaults without being overwritten.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            let cfg = Config::default();
            if let Err(e) = cfg.save_to(path) {
                eprintln!("⚠️ 写入默认配置失败: {}", e);
            }
            return cfg;
        }
        match std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str::<Config>(&s).map_err(anyhow::Error::from))
        {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("⚠️ 解析配置失败: {} ({})，使用默认配置", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body).with_context(|| format!("写入配置失败: {}", path.display()))?;
        Ok(())
    }

    pub fn save_to_storage(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Resolve a configured file relative to `base` (the working directory).
    pub fn resolve(base: &Path, p: &Path) -> PathBuf {
        if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
    }
}
