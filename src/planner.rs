use crate::RemigrateError;
use crate::ledger::FailureRecord;
use crate::probe::PathProbe;
use crate::transfer::posix_path;
use crate::trie::PathTrie;

/// Source and destination mount prefixes, stored without trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoints {
    pub source: String,
    pub destination: String,
}

impl MountPoints {
    pub fn new(source: &str, destination: &str) -> Self {
        Self { source: posix_path(source), destination: posix_path(destination) }
    }
}

/// A directory to re-sync, expressed on both trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveringDirectory {
    pub source: String,
    pub destination: String,
}

// Remainder of `path` after `mount`, only when the mount ends on a segment boundary.
fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    if mount == "/" {
        return Some(if path == "/" { "" } else { path });
    }
    let rest = path.strip_prefix(mount)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn rebuild(mount: &str, rest: &str) -> String {
    match (mount, rest) {
        ("/", "") => "/".to_string(),
        ("/", r) => r.to_string(),
        (m, r) => format!("{}{}", m, r),
    }
}

/// Longest common contiguous substring of `a` and `b` as `(start_in_a, start_in_b, len)`.
/// Ties resolve to the earliest start in `a`, then in `b`.
pub(crate) fn longest_common_substring(a: &str, b: &str) -> (usize, usize, usize) {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            cur[j] = if a[i - 1] == b[j - 1] { prev[j - 1] + 1 } else { 0 };
            let len = cur[j];
            if len > best.2 || (len == best.2 && len > 0 && (i - len, j - len) < (best.0, best.1)) {
                best = (i - len, j - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

// Split `path` at the end of its longest overlap with `mount`. The overlap must
// cover the tail of the mount and sit on segment boundaries in both strings,
// e.g. ledger path /mnt/nfs/src/a with mount /src gives "/a".
fn split_by_overlap<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    let (a, b, len) = longest_common_substring(mount, path);
    if len < 2 || a + len != mount.len() {
        return None;
    }
    if mount.as_bytes()[a] != b'/' || path.as_bytes()[b] != b'/' {
        return None;
    }
    let rest = &path[b + len..];
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Pair a covering path with its counterpart on the other tree.
///
/// The path may carry either mount prefix. Mounts are tried longest first so a
/// destination nested inside the source (or the reverse) is not mis-attributed.
/// When neither prefix matches literally, the longest common substring with a
/// mount gives the split point.
pub fn align(path: &str, mounts: &MountPoints) -> Result<CoveringDirectory, RemigrateError> {
    let path = posix_path(path);
    let (src, dst) = (mounts.source.as_str(), mounts.destination.as_str());

    let dest_first = dst.len() >= src.len();
    let order: [(&str, bool); 2] = if dest_first { [(dst, true), (src, false)] } else { [(src, false), (dst, true)] };
    for (mount, is_dest) in order {
        if let Some(rest) = strip_mount(&path, mount) {
            return Ok(if is_dest {
                CoveringDirectory { source: rebuild(src, rest), destination: path.clone() }
            } else {
                CoveringDirectory { source: path.clone(), destination: rebuild(dst, rest) }
            });
        }
    }

    if let Some(rest) = split_by_overlap(&path, src).or_else(|| split_by_overlap(&path, dst)) {
        tracing::debug!("[align] {} split by overlap, relative part '{}'", path, rest);
        return Ok(CoveringDirectory { source: rebuild(src, rest), destination: rebuild(dst, rest) });
    }

    Err(RemigrateError::MountMismatch {
        path,
        source_mount: src.to_string(),
        destination_mount: dst.to_string(),
    })
}

fn parent_dir(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// Turns the failure ledger into the list of directories to re-sync.
pub struct RemigrationPlanner<P: PathProbe> {
    mounts: MountPoints,
    probe: P,
}

impl<P: PathProbe> RemigrationPlanner<P> {
    pub fn new(mounts: MountPoints, probe: P) -> Self {
        Self { mounts, probe }
    }

    // Directory that will cover `file`: its parent, or the closest ancestor still
    // present on the source when the parent itself vanished (rename races). Never
    // climbs out of the source mount.
    fn anchor(&self, file: &str) -> String {
        let mut dir = parent_dir(file);
        loop {
            let below_mount = matches!(strip_mount(&dir, &self.mounts.source), Some(rest) if !rest.is_empty());
            if !below_mount {
                return dir;
            }
            match self.probe.exists(&dir) {
                Ok(true) => return dir,
                Ok(false) => {
                    tracing::debug!("[plan] {} gone from source, climbing", dir);
                    dir = parent_dir(&dir);
                }
                Err(e) => {
                    tracing::warn!("[plan] cannot stat {}: {}", dir, e);
                    return dir;
                }
            }
        }
    }

    // A directory strictly below a mount whose destination counterpart is absent.
    fn missing_at_destination(&self, dir: &str) -> bool {
        let Ok(pair) = align(dir, &self.mounts) else {
            return false;
        };
        if pair.destination == self.mounts.destination || pair.source == self.mounts.source {
            return false;
        }
        match self.probe.exists(&pair.destination) {
            Ok(found) => !found,
            Err(e) => {
                tracing::warn!("[plan] cannot stat {}: {}, treating as missing", pair.destination, e);
                true
            }
        }
    }

    /// Minimal set of covering directories for `paths`, in pre-order.
    pub fn covering_dirs<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut trie = PathTrie::new();
        for p in paths {
            // the trie works in source space; destination-side entries are mapped back first
            let source_side = match align(p, &self.mounts) {
                Ok(pair) => pair.source,
                Err(_) => posix_path(p),
            };
            let anchor = self.anchor(&source_side);
            if !trie.cover(&anchor) {
                tracing::debug!("[plan] {} already covered", anchor);
            }
        }
        trie.collapse(|dir| self.missing_at_destination(dir));
        trie.tails()
    }

    pub fn plan(&self, records: &[FailureRecord]) -> Result<Vec<CoveringDirectory>, RemigrateError> {
        let dirs = self.covering_dirs(records.iter().map(|r| r.path.as_str()));
        tracing::info!("[plan] {} failed files -> {} directories", records.len(), dirs.len());
        dirs.iter().map(|d| align(d, &self.mounts)).collect()
    }
}
