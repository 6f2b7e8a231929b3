// FAILED_LOGS.csv and timesheet.csv persistence.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::RemigrateError;

pub const LEDGER_HEADER: &str = "path,status";
pub const TIMING_HEADER: &str = "source,destination,start_time,end_time,time_taken";
// header written by the first generation of the migration scripts
const LEGACY_LEDGER_HEADER: &str = "FILE_NAME,MIGRATION_STATUS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    ReadyToMigrate,
    Success,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::ReadyToMigrate => "READY_TO_MIGRATE",
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "READY_TO_MIGRATE" => Ok(Status::ReadyToMigrate),
            "SUCCESS" => Ok(Status::Success),
            "FAILED" => Ok(Status::Failed),
            other => Err(format!("未知状态: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub path: String,
    pub status: Status,
    /// Classification from the transfer log; not persisted in the ledger file.
    pub error_kind: Option<String>,
}

impl FailureRecord {
    pub fn ready(path: impl Into<String>) -> Self {
        Self { path: path.into(), status: Status::ReadyToMigrate, error_kind: None }
    }
}

/// One row of the timing ledger. Written once, never rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTiming {
    pub source: String,
    pub destination: String,
    pub start_time: chrono::DateTime<chrono::Local>,
    pub end_time: chrono::DateTime<chrono::Local>,
}

impl SyncTiming {
    pub fn duration_minutes(&self) -> f64 {
        let ms = (self.end_time - self.start_time).num_milliseconds().max(0) as f64;
        (ms / 60_000.0 * 1000.0).round() / 1000.0
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// Split one CSV line into fields, honouring double-quoted fields with "" escapes.
fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        match (in_quotes, c) {
            (true, '"') => {
                if chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            (true, c) => cur.push(c),
            (false, '"') if cur.is_empty() => in_quotes = true,
            (false, ',') => fields.push(std::mem::take(&mut cur)),
            (false, c) => cur.push(c),
        }
    }
    if in_quotes {
        return Err("引号未闭合".to_string());
    }
    fields.push(cur);
    Ok(fields)
}

/// Raw `(path, status)` rows, header validated. Status text is not interpreted
/// so legacy ledgers (which stored the error kind in the status column) can
/// still be reset.
pub fn read_rows(path: &Path) -> Result<Vec<(String, String)>, RemigrateError> {
    if !path.exists() {
        return Err(RemigrateError::LedgerMissing(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| RemigrateError::io(path, e))?;
    let format_err = |line_no: usize, reason: String| RemigrateError::LedgerFormat {
        path: path.display().to_string(),
        line_no,
        reason,
    };
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, h)) if h.trim() == LEDGER_HEADER || h.trim() == LEGACY_LEDGER_HEADER => {}
        Some((_, h)) => return Err(format_err(1, format!("表头应为 '{}'，实际为 '{}'", LEDGER_HEADER, h))),
        None => return Err(format_err(1, "文件为空".to_string())),
    }
    let mut rows = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line).map_err(|r| format_err(idx + 1, r))?;
        if fields.len() < 2 || fields[0].is_empty() {
            return Err(format_err(idx + 1, format!("需要 path,status 两列: {}", line)));
        }
        rows.push((fields[0].clone(), fields[1].clone()));
    }
    Ok(rows)
}

/// Load the ledger. Duplicate paths keep their first position and last status.
pub fn load(path: &Path) -> Result<Vec<FailureRecord>, RemigrateError> {
    let rows = read_rows(path)?;
    let mut records: Vec<FailureRecord> = Vec::with_capacity(rows.len());
    let mut index = std::collections::HashMap::new();
    for (line_idx, (p, s)) in rows.into_iter().enumerate() {
        let status: Status = s.parse().map_err(|reason| RemigrateError::LedgerFormat {
            path: path.display().to_string(),
            line_no: line_idx + 2,
            reason,
        })?;
        match index.get(&p) {
            Some(&i) => {
                let rec: &mut FailureRecord = &mut records[i];
                rec.status = status;
            }
            None => {
                index.insert(p.clone(), records.len());
                records.push(FailureRecord { path: p, status, error_kind: None });
            }
        }
    }
    Ok(records)
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target.file_name().and_then(|s| s.to_str()).unwrap_or("ledger");
    target.with_file_name(format!(".{}.tmp.{}", name, std::process::id()))
}

/// Rewrite the ledger: write a sibling temp file, fsync, then rename over the
/// target so readers see either the old or the new ledger, never a torn one.
pub fn save(path: &Path, records: &[FailureRecord]) -> Result<(), RemigrateError> {
    let tmp = temp_path_for(path);
    let write = || -> std::io::Result<()> {
        let mut f = std::fs::File::create(&tmp)?;
        writeln!(f, "{}", LEDGER_HEADER)?;
        for rec in records {
            writeln!(f, "{},{}", csv_escape(&rec.path), rec.status)?;
        }
        f.sync_all()
    };
    if let Err(e) = write() {
        let _ = std::fs::remove_file(&tmp);
        return Err(RemigrateError::io(&tmp, e));
    }
    // rename 失败时保留临时文件，原清单保持不变 — on failure the old ledger and the temp file both stay
    if let Err(e) = std::fs::rename(&tmp, path) {
        return Err(RemigrateError::Io {
            path: path.display().to_string(),
            reason: format!("{}; new contents kept in {}", e, tmp.display()),
        });
    }
    tracing::debug!("[ledger] wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Reset every row to READY_TO_MIGRATE ahead of a remigration pass.
pub fn reset_for_remigration(path: &Path) -> Result<Vec<FailureRecord>, RemigrateError> {
    let rows = read_rows(path)?;
    let mut seen = std::collections::HashSet::new();
    let records: Vec<FailureRecord> = rows
        .into_iter()
        .filter(|(p, _)| seen.insert(p.clone()))
        .map(|(p, _)| FailureRecord::ready(p))
        .collect();
    save(path, &records)?;
    tracing::info!("[ledger] {} rows reset to {}", records.len(), Status::ReadyToMigrate);
    Ok(records)
}

/// Append one timing row, preceded by the header (repeated on every write).
pub fn append_timing(path: &Path, timing: &SyncTiming) -> Result<(), RemigrateError> {
    const FMT: &str = "%a %b %e %H:%M:%S %Y";
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RemigrateError::io(path, e))?;
    let row = format!(
        "{}\n{},{},{},{},{}\n",
        TIMING_HEADER,
        csv_escape(&timing.source),
        csv_escape(&timing.destination),
        timing.start_time.format(FMT),
        timing.end_time.format(FMT),
        timing.duration_minutes()
    );
    f.write_all(row.as_bytes()).map_err(|e| RemigrateError::io(path, e))
}
