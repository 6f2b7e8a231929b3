use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::RemigrateError;
use crate::ledger::{self, FailureRecord, Status};
use crate::planner::{MountPoints, align};
use crate::probe::PathProbe;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

// rsync receives into `.<name>.XXXXXX` next to the final file and renames it at the end
fn temp_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\.(.+)\.[A-Za-z0-9]{6}$").expect("valid rsync temp name pattern"))
}

/// Final path of an rsync receiver temp file, `None` for ordinary names.
pub fn rsync_final_name(path: &str) -> Option<String> {
    let (dir, name) = path.rsplit_once('/')?;
    let caps = temp_name_pattern().captures(name)?;
    Some(format!("{}/{}", dir, caps.get(1)?.as_str()))
}

/// Re-checks every ledger entry against the destination tree after a resync.
pub struct ValidationService<P: PathProbe> {
    mounts: MountPoints,
    probe: P,
}

impl<P: PathProbe> ValidationService<P> {
    pub fn new(mounts: MountPoints, probe: P) -> Self {
        Self { mounts, probe }
    }

    /// Status for one record. Alignment failures and probe errors count as FAILED.
    pub fn check(&self, record: &FailureRecord) -> Status {
        let destination = match align(&record.path, &self.mounts) {
            Ok(pair) => pair.destination,
            Err(e) => {
                tracing::warn!("[validate] {}", e);
                return Status::Failed;
            }
        };
        let status = self.check_path(&destination);
        match rsync_final_name(&destination) {
            // failed renames are logged under the temp name; the real file is what counts
            Some(target) if status == Status::Failed => {
                tracing::debug!("[validate] {} is an rsync temp name, checking {}", destination, target);
                self.check_path(&target)
            }
            _ => status,
        }
    }

    fn check_path(&self, destination: &str) -> Status {
        match self.probe.exists(destination) {
            Ok(true) => Status::Success,
            Ok(false) => {
                tracing::debug!("[validate] still missing: {}", destination);
                Status::Failed
            }
            Err(e) => {
                tracing::warn!("[validate] cannot stat {}: {}", destination, e);
                Status::Failed
            }
        }
    }

    /// Recompute statuses in place.
    pub fn apply(&self, records: &mut [FailureRecord]) -> ValidationSummary {
        let mut summary = ValidationSummary { total: records.len(), ..Default::default() };
        for rec in records.iter_mut() {
            rec.status = self.check(rec);
            match rec.status {
                Status::Success => summary.success += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }

    /// Load the ledger, recompute every status and atomically rewrite it.
    pub fn validate_ledger(&self, ledger_path: &Path) -> Result<ValidationSummary, RemigrateError> {
        let mut records = ledger::load(ledger_path)?;
        let summary = self.apply(&mut records);
        ledger::save(ledger_path, &records)?;
        tracing::info!(
            "[validate] {} records: {} succeeded, {} still failing",
            summary.total,
            summary.success,
            summary.failed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fake::FakeFs;

    fn mounts() -> MountPoints {
        MountPoints::new("/m", "/d")
    }

    #[test]
    fn statuses_follow_destination() {
        let mut fs = FakeFs::with(&["/d/a/f1", "/d/b/c/f3"]);
        fs.break_path("/d/a/f2");
        let svc = ValidationService::new(mounts(), &fs);
        let mut recs: Vec<_> = ["/m/a/f1", "/m/a/f2", "/m/b/c/f3", "/elsewhere/f4"]
            .iter()
            .map(|p| FailureRecord::ready(*p))
            .collect();
        let summary = svc.apply(&mut recs);
        let statuses: Vec<_> = recs.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Status::Success, Status::Failed, Status::Success, Status::Failed]);
        assert_eq!(summary, ValidationSummary { total: 4, success: 2, failed: 2 });
    }

    #[test]
    fn rsync_temp_names_map_to_final_file() {
        assert_eq!(rsync_final_name("/d/x/.f.Ab12Cd").as_deref(), Some("/d/x/f"));
        assert_eq!(rsync_final_name("/d/x/.report.v2.pdf.x9Y8z7").as_deref(), Some("/d/x/report.v2.pdf"));
        assert_eq!(rsync_final_name("/.f.Ab12Cd").as_deref(), Some("/f"));
        assert_eq!(rsync_final_name("/d/x/f.Ab12Cd"), None);
        assert_eq!(rsync_final_name("/d/x/.bashrc"), None);
    }

    #[test]
    fn destination_temp_entry_succeeds_once_final_file_exists() {
        let rec = FailureRecord::ready("/d/x/.f.Ab12Cd");
        let present = FakeFs::with(&["/d/x/f"]);
        assert_eq!(ValidationService::new(mounts(), &present).check(&rec), Status::Success);
        let absent = FakeFs::with(&["/d/x/other"]);
        assert_eq!(ValidationService::new(mounts(), &absent).check(&rec), Status::Failed);
        // a dotfile that merely looks like a temp name still succeeds on its own
        let literal = FakeFs::with(&["/d/x/.f.Ab12Cd"]);
        assert_eq!(ValidationService::new(mounts(), &literal).check(&rec), Status::Success);
    }

    #[test]
    fn ledger_is_rewritten() {
        let dir = std::env::temp_dir().join(format!(
            "rmg_validate_test_{}_{}",
            std::process::id(),
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos()
        ));
        std::fs::create_dir(&dir).unwrap();
        let p = dir.join("FAILED_LOGS.csv");
        std::fs::write(&p, "path,status\n/m/a/f1,READY_TO_MIGRATE\n/m/a/f2,READY_TO_MIGRATE\n").unwrap();
        let fs = FakeFs::with(&["/d/a/f1"]);
        let summary = ValidationService::new(mounts(), &fs).validate_ledger(&p).unwrap();
        assert_eq!(summary.success, 1);
        let text = std::fs::read_to_string(&p).unwrap();
        assert_eq!(text, "path,status\n/m/a/f1,SUCCESS\n/m/a/f2,FAILED\n");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
