use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::RemigrateError;
use crate::ledger::{FailureRecord, Status};

/// Substrings rsync workers print when a single file could not be transferred.
pub const ERROR_SIGNATURES: &[&str] = &["file has vanished:", "rsync: rename", "rsync: link_stat"];

// 2024/03/01 10:11:12 [4242] file has vanished: "/mnt/src/a/b.txt"
// date, time, [pid], error kind, "quoted absolute path", remainder
fn line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^([0-9/]+) ([0-9:]+) (\[[0-9]+\]) ([a-z :_]+) "([^"]+)"(.*)$"#)
            .expect("valid failure line pattern")
    })
}

/// Failed paths in order of first appearance; a later hit on the same path
/// replaces its error kind but keeps the position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailureSet {
    order: Vec<String>,
    kinds: HashMap<String, String>,
}

impl FailureSet {
    pub fn insert(&mut self, path: String, kind: String) {
        if !self.kinds.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.kinds.insert(path, kind);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn kind_of(&self, path: &str) -> Option<&str> {
        self.kinds.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order.iter().map(|p| (p.as_str(), self.kinds[p].as_str()))
    }

    /// Ledger rows for a fresh remigration: every path starts as READY_TO_MIGRATE.
    pub fn into_records(self) -> Vec<FailureRecord> {
        let FailureSet { order, mut kinds } = self;
        order
            .into_iter()
            .map(|path| {
                let error_kind = kinds.remove(&path);
                FailureRecord { path, status: Status::ReadyToMigrate, error_kind }
            })
            .collect()
    }
}

/// Scans rsync worker logs for recognised failure signatures.
#[derive(Debug, Clone)]
pub struct FailureLogParser {
    signatures: Vec<String>,
}

impl Default for FailureLogParser {
    fn default() -> Self {
        Self::new(ERROR_SIGNATURES.iter().map(|s| s.to_string()).collect())
    }
}

impl FailureLogParser {
    pub fn new(signatures: Vec<String>) -> Self {
        Self { signatures }
    }

    pub fn is_failure_line(&self, line: &str) -> bool {
        self.signatures.iter().any(|sig| line.contains(sig.as_str()))
    }

    /// Extract `(path, error kind)` from a single log line, if it has the
    /// expected shape.
    pub fn extract(line: &str) -> Option<(String, String)> {
        let caps = line_pattern().captures(line.trim_end_matches(['\r', '\n']))?;
        let kind = caps.get(4)?.as_str().trim().trim_end_matches(':').trim_end();
        let path = caps.get(5)?.as_str();
        Some((path.to_string(), kind.to_string()))
    }

    /// Feed the lines of one log source into `into`. `source` only labels errors.
    pub fn parse_lines<'a, I>(
        &self,
        source: &str,
        lines: I,
        into: &mut FailureSet,
    ) -> Result<(), RemigrateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for (idx, line) in lines.into_iter().enumerate() {
            if !self.is_failure_line(line) {
                continue;
            }
            match Self::extract(line) {
                Some((path, kind)) => {
                    if path.contains(char::REPLACEMENT_CHARACTER) {
                        tracing::warn!("[parse] {}:{} path is not valid UTF-8: {}", source, idx + 1, path);
                    }
                    tracing::debug!("[parse] {}:{} failed file {} ({})", source, idx + 1, path, kind);
                    into.insert(path, kind);
                }
                None => {
                    return Err(RemigrateError::Parse {
                        file: source.to_string(),
                        line_no: idx + 1,
                        line: line.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn parse_str(&self, source: &str, text: &str) -> Result<FailureSet, RemigrateError> {
        let mut set = FailureSet::default();
        self.parse_lines(source, text.lines(), &mut set)?;
        Ok(set)
    }

    /// Parse every file, in sorted path order so repeated runs agree on which
    /// error kind wins for a path seen in several logs.
    pub fn parse_files<P: AsRef<Path>>(&self, files: &[P]) -> Result<FailureSet, RemigrateError> {
        let mut sorted: Vec<PathBuf> = files.iter().map(|p| p.as_ref().to_path_buf()).collect();
        sorted.sort();
        let mut set = FailureSet::default();
        for file in &sorted {
            // rsync echoes raw file names, which are not guaranteed to be UTF-8
            let bytes = std::fs::read(file).map_err(|e| RemigrateError::io(file, e))?;
            let text = String::from_utf8_lossy(&bytes);
            if matches!(text, Cow::Owned(_)) {
                tracing::warn!(
                    "[parse] {} contains non-UTF-8 bytes; affected paths are recorded with U+FFFD and will not validate",
                    file.display()
                );
            }
            tracing::debug!("[parse] scanning {}", file.display());
            self.parse_lines(&file.display().to_string(), text.lines(), &mut set)?;
        }
        Ok(set)
    }
}
