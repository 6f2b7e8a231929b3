use std::fs::OpenOptions;
use std::process::{Command, Stdio};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::helpers::{destination_dir_arg, display_path, rsync_flag_arg, source_dir_arg};
use super::{TransferConfig, TransferOutcome, TransferRunner};
use crate::RemigrateError;

/// Argument vector for one msrsync invocation. Paths and flags are separate
/// arguments, nothing is interpreted by a shell.
pub fn build_args(cfg: &TransferConfig, source: &str, destination: &str) -> Vec<String> {
    let mut args = vec![
        "-P".to_string(),
        "-p".to_string(),
        cfg.workers.max(1).to_string(),
        "--stats".to_string(),
        "--buckets".to_string(),
        cfg.stats_dir.to_string_lossy().to_string(),
        "--keep".to_string(),
    ];
    if let Some(flags) = rsync_flag_arg(&cfg.rsync_flags) {
        args.push("--rsync".to_string());
        args.push(flags);
    }
    args.push(source_dir_arg(source));
    args.push(destination_dir_arg(destination));
    args
}

/// Runs msrsync as a blocking child process, appending its stdout/stderr to the
/// capture files named in the config.
pub struct MsrsyncRunner {
    cfg: TransferConfig,
    show_progress: bool,
}

impl MsrsyncRunner {
    pub fn new(cfg: TransferConfig) -> Self {
        Self { cfg, show_progress: true }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn spinner(&self, source: &str, destination: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if !self.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("msrsync {} -> {}", source, destination));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

impl TransferRunner for MsrsyncRunner {
    fn run(&mut self, source: &str, destination: &str) -> Result<TransferOutcome, RemigrateError> {
        let args = build_args(&self.cfg, source, destination);
        let program = self.cfg.executable.to_string_lossy().to_string();
        let command_line = format!("{} {}", program, args.join(" "));

        let open_append = |p: &std::path::Path| {
            OpenOptions::new().create(true).append(true).open(p).map_err(|e| RemigrateError::io(p, e))
        };
        let out = open_append(&self.cfg.stdout_log)?;
        let err = open_append(&self.cfg.stderr_log)?;

        tracing::info!("[transfer] starting: {}", command_line);
        tracing::info!(
            "[transfer] output goes to {} and {}",
            display_path(&self.cfg.stdout_log),
            display_path(&self.cfg.stderr_log)
        );
        let mut child = Command::new(&self.cfg.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .spawn()
            .map_err(|e| RemigrateError::Spawn { program: command_line.clone(), reason: e.to_string() })?;

        let pb = self.spinner(source, destination);
        // 阻塞等待，不设超时：大目录可能需要数小时 — blocking wait without timeout, large trees take hours
        let status = child.wait();
        pb.finish_and_clear();
        let status = status
            .map_err(|e| RemigrateError::Spawn { program: command_line.clone(), reason: e.to_string() })?;
        tracing::info!("[transfer] finished: {} ({})", command_line, status);
        Ok(TransferOutcome { exit_code: status.code() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_tmp_dir() -> PathBuf {
        let mut base = std::env::temp_dir();
        let uniq = format!(
            "rmg_msrsync_test_{}_{}",
            std::process::id(),
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos()
        );
        base.push(uniq);
        std::fs::create_dir(&base).expect("create tmp dir");
        base
    }

    fn cfg(dir: &std::path::Path, exe: &str) -> TransferConfig {
        TransferConfig {
            executable: PathBuf::from(exe),
            workers: 14,
            stats_dir: dir.join("logs"),
            rsync_flags: "aHAX".to_string(),
            stdout_log: dir.join("msrsync_out.txt"),
            stderr_log: dir.join("msrsync_err.txt"),
        }
    }

    #[test]
    fn args_layout() {
        let mut c = cfg(std::path::Path::new("/w"), "msrsync");
        let args = build_args(&c, "/src/a", "/dst/a/");
        assert_eq!(
            args,
            vec!["-P", "-p", "14", "--stats", "--buckets", "/w/logs", "--keep", "--rsync", "-aHAX", "/src/a/", "/dst/a"]
        );
        c.rsync_flags.clear();
        c.workers = 0;
        let args = build_args(&c, "/src/a", "/dst/a");
        assert!(!args.contains(&"--rsync".to_string()));
        assert_eq!(args[2], "1");
    }

    #[test]
    fn spawn_failure_is_reported() {
        let dir = make_tmp_dir();
        let c = cfg(&dir, "/nonexistent/definitely-not-msrsync");
        let err = MsrsyncRunner::new(c).with_progress(false).run("/src/a", "/dst/a").unwrap_err();
        match err {
            RemigrateError::Spawn { program, .. } => assert!(program.contains("definitely-not-msrsync")),
            other => panic!("unexpected error: {:?}", other),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn exit_codes_are_passed_through() {
        let dir = make_tmp_dir();
        let ok = MsrsyncRunner::new(cfg(&dir, "true")).with_progress(false).run("/a", "/b").unwrap();
        assert!(ok.success());
        let bad = MsrsyncRunner::new(cfg(&dir, "false")).with_progress(false).run("/a", "/b").unwrap();
        assert!(!bad.success());
        assert_eq!(bad.exit_code, Some(1));
        assert!(dir.join("msrsync_out.txt").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
