// Prefix tree over directory segments, used to shrink a flat list of failed files
// into the smallest set of directories that must be re-synced.
use std::collections::BTreeMap;

const ROOT: usize = 0;

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<String, usize>,
    is_tail: bool,
    covered_path: Option<String>,
}

/// Arena-backed trie. Nodes refer to children by index only; a node marked as a
/// tail drops its child links, the detached nodes simply stay unused in the arena
/// until the trie is dropped at the end of the planning run.
#[derive(Debug)]
pub struct PathTrie {
    nodes: Vec<Node>,
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(dir: &str) -> impl Iterator<Item = &str> {
    dir.split('/').filter(|s| !s.is_empty() && *s != ".")
}

fn join(parent: &str, seg: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), seg)
}

impl PathTrie {
    pub fn new() -> Self {
        Self { nodes: vec![Node::default()] }
    }

    fn child_or_insert(&mut self, parent: usize, seg: &str) -> usize {
        if let Some(&idx) = self.nodes[parent].children.get(seg) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node::default());
        self.nodes[parent].children.insert(seg.to_string(), idx);
        idx
    }

    fn mark_tail(&mut self, idx: usize, path: String) {
        let node = &mut self.nodes[idx];
        node.is_tail = true;
        node.covered_path = Some(path);
        node.children.clear();
    }

    /// Insert directory `dir` and make it a covering tail.
    ///
    /// Returns `false` when `dir` (or one of its ancestors) is already a tail, in
    /// which case the trie is left untouched. Any tails below `dir` are discarded.
    pub fn cover(&mut self, dir: &str) -> bool {
        if self.nodes[ROOT].is_tail {
            return false;
        }
        let mut idx = ROOT;
        let mut path = String::new();
        for seg in segments(dir) {
            path = join(&path, seg);
            idx = self.child_or_insert(idx, seg);
            if self.nodes[idx].is_tail {
                return false;
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        self.mark_tail(idx, path);
        true
    }

    /// Walk top-down and turn a node into a tail as soon as one of its children
    /// is reported missing by `is_missing`. Descendants of a new tail are not
    /// evaluated.
    pub fn collapse<F>(&mut self, mut is_missing: F)
    where
        F: FnMut(&str) -> bool,
    {
        let mut stack: Vec<(usize, String)> = vec![(ROOT, String::new())];
        while let Some((idx, path)) = stack.pop() {
            if self.nodes[idx].is_tail {
                continue;
            }
            let children: Vec<(String, usize)> =
                self.nodes[idx].children.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let mut next = Vec::with_capacity(children.len());
            let mut became_tail = false;
            for (seg, child) in children {
                let child_path = join(&path, &seg);
                if is_missing(&child_path) {
                    let own = if path.is_empty() { "/".to_string() } else { path.clone() };
                    tracing::debug!("[trie] {} missing, {} becomes tail", child_path, own);
                    self.mark_tail(idx, own);
                    became_tail = true;
                    break;
                }
                next.push((child, child_path));
            }
            if !became_tail {
                stack.extend(next.into_iter().rev());
            }
        }
    }

    /// Covering directories in pre-order (segments visited in sorted order).
    pub fn tails(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.is_tail {
                if let Some(p) = &node.covered_path {
                    out.push(p.clone());
                }
                continue;
            }
            stack.extend(node.children.values().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_ancestor(a: &str, b: &str) -> bool {
        a == "/" || (b.len() > a.len() && b.starts_with(a) && b.as_bytes()[a.len()] == b'/')
    }

    fn parent_of(file: &str) -> &str {
        match file.rfind('/') {
            Some(0) | None => "/",
            Some(i) => &file[..i],
        }
    }

    fn build(files: &[&str]) -> PathTrie {
        let mut t = PathTrie::new();
        for f in files {
            t.cover(parent_of(f));
        }
        t
    }

    const FILES: &[&str] = &[
        "/m/a/f1",
        "/m/a/f2",
        "/m/b/c/f3",
        "/m/b/c/d/e/f4",
        "/m/b/x/f5",
        "/m/a/deep/er/f6",
        "/n/f7",
        "/m/b/f8",
    ];

    #[test]
    fn same_directory_collapses_to_one_tail() {
        let t = build(&["/m/x/f1", "/m/x/f2"]);
        assert_eq!(t.tails(), vec!["/m/x".to_string()]);
    }

    #[test]
    fn two_directory_scenario() {
        let t = build(&["/m/a/f1", "/m/a/f2", "/m/b/c/f3"]);
        assert_eq!(t.tails(), vec!["/m/a".to_string(), "/m/b/c".to_string()]);
    }

    #[test]
    fn file_under_root_covers_root() {
        let t = build(&["/m/a/f1", "/top"]);
        assert_eq!(t.tails(), vec!["/".to_string()]);
        let mut t = PathTrie::new();
        assert!(t.cover("/"));
        assert!(!t.cover("/m/a"));
        assert_eq!(t.tails(), vec!["/".to_string()]);
    }

    #[test]
    fn shallow_tail_discards_deeper_tail_in_any_order() {
        let a = build(&["/m/a/b/f1", "/m/a/f2"]);
        let b = build(&["/m/a/f2", "/m/a/b/f1"]);
        assert_eq!(a.tails(), vec!["/m/a".to_string()]);
        assert_eq!(a.tails(), b.tails());
    }

    #[test]
    fn tails_are_minimal_and_complete() {
        let t = build(FILES);
        let tails = t.tails();
        for x in &tails {
            for y in &tails {
                assert!(x == y || !is_ancestor(x, y), "{} nests {}", x, y);
            }
        }
        for f in FILES {
            let covering: Vec<_> =
                tails.iter().filter(|t| is_ancestor(t, f)).collect();
            assert_eq!(covering.len(), 1, "{} covered by {:?}", f, covering);
        }
    }

    #[test]
    fn collapse_marks_parent_of_missing_child() {
        let mut t = build(&["/m/a/f1", "/m/b/c/f3", "/m/b/x/f5"]);
        assert_eq!(t.tails().len(), 3);
        t.collapse(|p| p == "/m/b/c");
        assert_eq!(t.tails(), vec!["/m/a".to_string(), "/m/b".to_string()]);
    }

    #[test]
    fn collapse_does_not_evaluate_below_new_tail() {
        let mut t = build(FILES);
        let mut seen = Vec::new();
        t.collapse(|p| {
            seen.push(p.to_string());
            p == "/m"
        });
        assert_eq!(t.tails(), vec!["/".to_string()]);
        assert!(seen.iter().all(|p| !p.starts_with("/m/")));
    }

    #[test]
    fn collapse_with_nothing_missing_keeps_tails() {
        let mut t = build(FILES);
        let before = t.tails();
        t.collapse(|_| false);
        assert_eq!(t.tails(), before);
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let run = || {
            let mut t = build(FILES);
            t.collapse(|p| p == "/m/b/x");
            t.tails()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn empty_trie_has_no_tails() {
        let mut t = PathTrie::new();
        t.collapse(|_| true);
        assert!(t.tails().is_empty());
    }
}
