use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use remigrator::config::Config;
use remigrator::ledger::{self, Status};
use remigrator::parse::FailureLogParser;
use remigrator::{RemigrateError, commands};

static DIR_COUNTER: AtomicU64 = AtomicU64::new(1);

fn unique_dir(tag: &str) -> PathBuf {
    let now_ns = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let pid = std::process::id();
    let cnt = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("rmg_genlogs_{}_{}_{}_{}", tag, now_ns, pid, cnt));
    fs::create_dir_all(&dir).unwrap();
    dir
}

const WORKER_1: &str = "\
2024/03/01 10:11:10 [4242] building file list
2024/03/01 10:11:12 [4242] file has vanished: \"/m/x/f1\"
2024/03/01 10:11:14 [4242] sent 120 bytes  received 35 bytes
";

const WORKER_2: &str = "\
2024/03/01 10:11:13 [4243] rsync: rename \"/m/x/.f2.XyZ\" -> \"x/f2\": No such file or directory (2)
2024/03/01 10:11:15 [4243] rsync: link_stat \"/m/y/f3\" failed: No such file or directory (2)
2024/03/01 10:11:16 [4243] file has vanished: \"/m/x/f1\"
";

#[test]
fn ledger_written_from_bucket_logs() {
    let cwd = unique_dir("ok");
    let bucket = cwd.join("logs").join("msrsync-abc123");
    fs::create_dir_all(bucket.join("nested")).unwrap();
    fs::write(bucket.join("w1.log"), WORKER_1).unwrap();
    fs::write(bucket.join("nested").join("w2.LOG"), WORKER_2).unwrap();
    fs::write(bucket.join("notes.txt"), "file has vanished: \"/m/ignored\"").unwrap();

    let cfg = Config::default();
    let written = commands::handle_generate_logs(&cfg, &cwd).unwrap();
    assert_eq!(written, 3);

    let records = ledger::load(&cwd.join("FAILED_LOGS.csv")).unwrap();
    let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
    // logs are read in sorted path order: nested/w2.LOG before w1.log
    assert_eq!(paths, vec!["/m/x/.f2.XyZ", "/m/y/f3", "/m/x/f1"]);
    assert!(records.iter().all(|r| r.status == Status::ReadyToMigrate));

    let _ = fs::remove_dir_all(&cwd);
}

#[test]
fn missing_bucket_dir_is_a_warning() {
    let cwd = unique_dir("nobucket");
    let cfg = Config::default();
    assert_eq!(commands::handle_generate_logs(&cfg, &cwd).unwrap(), 0);
    assert!(!cwd.join("FAILED_LOGS.csv").exists());
    let _ = fs::remove_dir_all(&cwd);
}

#[test]
fn clean_run_writes_no_ledger() {
    let cwd = unique_dir("clean");
    let bucket = cwd.join("logs").join("msrsync_xyz");
    fs::create_dir_all(&bucket).unwrap();
    fs::write(bucket.join("w1.log"), "2024/03/01 10:11:10 [1] sent 1 bytes  received 2 bytes\n").unwrap();
    let cfg = Config::default();
    assert_eq!(commands::handle_generate_logs(&cfg, &cwd).unwrap(), 0);
    assert!(!cwd.join("FAILED_LOGS.csv").exists());
    let _ = fs::remove_dir_all(&cwd);
}

#[test]
fn malformed_failure_line_is_fatal() {
    let cwd = unique_dir("malformed");
    let bucket = cwd.join("logs").join("msrsync-1");
    fs::create_dir_all(&bucket).unwrap();
    fs::write(bucket.join("w1.log"), "garbage file has vanished: no quotes here\n").unwrap();
    let cfg = Config::default();
    let err = commands::handle_generate_logs(&cfg, &cwd).unwrap_err();
    let err = err.downcast_ref::<RemigrateError>().unwrap();
    assert!(matches!(err, RemigrateError::Parse { line_no: 1, .. }));
    assert!(err.is_fatal());
    let _ = fs::remove_dir_all(&cwd);
}

#[test]
fn parsed_failures_survive_a_ledger_round_trip() {
    let dir = unique_dir("roundtrip");
    let text = "\
2024/03/01 10:11:12 [4242] file has vanished: \"/m/x/f1\"
2024/03/01 10:11:13 [4243] rsync: rename \"/m/x/f2\" -> \"x/f2\": No such file or directory (2)
";
    let set = FailureLogParser::default().parse_str("w1.log", text).unwrap();
    assert_eq!(set.kind_of("/m/x/f1"), Some("file has vanished"));
    assert_eq!(set.kind_of("/m/x/f2"), Some("rsync: rename"));

    let ledger_path = dir.join("FAILED_LOGS.csv");
    ledger::save(&ledger_path, &set.into_records()).unwrap();
    let body = fs::read_to_string(&ledger_path).unwrap();
    assert_eq!(body, "path,status\n/m/x/f1,READY_TO_MIGRATE\n/m/x/f2,READY_TO_MIGRATE\n");

    let loaded = ledger::load(&ledger_path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].path, "/m/x/f1");
    assert_eq!(loaded[1].path, "/m/x/f2");
    let _ = fs::remove_dir_all(&dir);
}
