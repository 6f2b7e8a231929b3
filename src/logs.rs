// Discovery of msrsync's bucket directory and the per-worker rsync logs inside it.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::RemigrateError;

fn bucket_dir_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^msrsync\W+").expect("valid bucket dir pattern"))
}

/// Create the statistics directory handed to msrsync when it is missing.
/// Returns whether it had to be created.
pub fn ensure_stats_dir(dir: &Path) -> Result<bool, RemigrateError> {
    if dir.is_dir() {
        tracing::info!("[logs] using existing stats directory {}", dir.display());
        return Ok(false);
    }
    std::fs::create_dir_all(dir).map_err(|e| RemigrateError::io(dir, e))?;
    tracing::debug!("[logs] created stats directory {}", dir.display());
    Ok(true)
}

/// First directory below `root` (sorted walk) whose name looks like an msrsync
/// bucket directory (`msrsync-…`, `msrsync_…`).
pub fn find_bucket_dir(root: &Path) -> Result<PathBuf, RemigrateError> {
    let found = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .find(|e| bucket_dir_pattern().is_match(&e.file_name().to_string_lossy()));
    match found {
        Some(entry) => {
            tracing::info!("[logs] msrsync bucket directory: {}", entry.path().display());
            Ok(entry.into_path())
        }
        None => Err(RemigrateError::StatsDirNotFound(root.display().to_string())),
    }
}

/// All `*.log` files under `dir`, sorted.
pub fn collect_log_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| x.eq_ignore_ascii_case("log"))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    tracing::debug!("[logs] {} log files under {}", files.len(), dir.display());
    files
}

/// Remove the bucket directory left behind by a previous run, if any.
pub fn purge_bucket_dir(root: &Path) -> Result<Option<PathBuf>, RemigrateError> {
    match find_bucket_dir(root) {
        Ok(dir) => {
            std::fs::remove_dir_all(&dir).map_err(|e| RemigrateError::io(&dir, e))?;
            tracing::info!("[logs] removed old bucket directory {}", dir.display());
            Ok(Some(dir))
        }
        Err(RemigrateError::StatsDirNotFound(_)) => {
            tracing::info!("[logs] no old migration logs found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
