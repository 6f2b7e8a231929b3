/// Normalize a path-like string for display:
/// - converts backslashes to forward slashes
/// - collapses repeated slashes
/// - optionally preserves a trailing slash (useful to keep explicit-dir-suffix semantics)
fn normalize_path(p: &str, preserve_trailing_slash: bool) -> String {
    if p.is_empty() {
        return String::new();
    }
    let mut s = p.trim().replace('\\', "/");
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    if !preserve_trailing_slash {
        // Strip trailing slashes, but keep root "/"
        while s.len() > 1 && s.ends_with('/') {
            s.pop();
        }
    }
    s
}

/// Canonical form of a mount, ledger or covering path: repeated slashes
/// collapsed, trailing slashes stripped (root stays "/").
///
/// Only '/' is a separator here. Backslashes and surrounding spaces are legal
/// in POSIX file names and are kept as they are.
pub fn posix_path(p: &str) -> String {
    let mut s = String::with_capacity(p.len());
    for c in p.chars() {
        if c == '/' && s.ends_with('/') {
            continue;
        }
        s.push(c);
    }
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// Source argument for the transfer tool. A trailing slash makes rsync copy the
/// directory's contents into the destination instead of nesting a second copy
/// of the directory inside it.
pub fn source_dir_arg(source: &str) -> String {
    let s = posix_path(source);
    if s.ends_with('/') { s } else { format!("{}/", s) }
}

/// Destination argument, never with a trailing slash.
pub fn destination_dir_arg(destination: &str) -> String {
    posix_path(destination)
}

/// Value for msrsync's `--rsync` option. Users pass bare short flags
/// (`aHAX`) or a dashed form (`-aHAX --numeric-ids`); both are accepted.
pub fn rsync_flag_arg(flags: &str) -> Option<String> {
    let f = flags.trim();
    if f.is_empty() {
        return None;
    }
    Some(if f.starts_with('-') { f.to_string() } else { format!("-{}", f) })
}

// Lightweight path display wrapper that renders with forward slashes.
pub(crate) struct DisplayPath<'a>(pub(crate) &'a std::path::Path);

impl<'a> std::fmt::Display for DisplayPath<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.to_string_lossy().to_string();
        f.write_str(&normalize_path(&s, true))
    }
}

pub(crate) fn display_path(p: &std::path::Path) -> DisplayPath<'_> {
    DisplayPath(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize_path("", true), "");
        assert_eq!(normalize_path("", false), "");
    }

    #[test]
    fn preserve_and_strip_trailing_slash() {
        assert_eq!(normalize_path("/a/b/", true), "/a/b/");
        assert_eq!(normalize_path("/a/b/", false), "/a/b");
        // root should remain "/"
        assert_eq!(normalize_path("/", true), "/");
        assert_eq!(normalize_path("/", false), "/");
    }

    #[test]
    fn collapse_repeated_slashes() {
        assert_eq!(normalize_path("//mnt///src//a", false), "/mnt/src/a");
    }

    #[test]
    fn posix_path_keeps_backslashes_and_spaces() {
        assert_eq!(posix_path("//m///a/we\\ird"), "/m/a/we\\ird");
        assert_eq!(posix_path("/m/a/trailing /"), "/m/a/trailing ");
        assert_eq!(posix_path(" /m/a"), " /m/a");
        assert_eq!(posix_path("/"), "/");
        assert_eq!(posix_path("///"), "/");
        assert_eq!(posix_path(""), "");
    }

    #[test]
    fn source_gets_exactly_one_trailing_slash() {
        assert_eq!(source_dir_arg("/mnt/src/a"), "/mnt/src/a/");
        assert_eq!(source_dir_arg("/mnt/src/a//"), "/mnt/src/a/");
        assert_eq!(source_dir_arg("/"), "/");
        assert_eq!(destination_dir_arg("/mnt/dst/a/"), "/mnt/dst/a");
        assert_eq!(source_dir_arg("/mnt/src/we\\ird "), "/mnt/src/we\\ird /");
    }

    #[test]
    fn rsync_flags_get_a_dash() {
        assert_eq!(rsync_flag_arg("aHAX").as_deref(), Some("-aHAX"));
        assert_eq!(rsync_flag_arg(" -av --numeric-ids ").as_deref(), Some("-av --numeric-ids"));
        assert_eq!(rsync_flag_arg("  "), None);
    }

    #[test]
    fn display_path_uses_normalize() {
        use std::path::Path;
        let p = Path::new("C:\\some\\path\\");
        assert_eq!(format!("{}", display_path(p)), "C:/some/path/");
    }
}
