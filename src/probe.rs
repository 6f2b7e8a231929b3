use std::path::Path;

/// Existence check used by planning and validation. Kept behind a trait so the
/// trie reduction and the validation pass can run against a fake filesystem.
pub trait PathProbe {
    /// `Ok(true)` when `path` exists, `Ok(false)` when it definitely does not,
    /// `Err` when the filesystem could not answer (permission denied, name too long).
    fn exists(&self, path: &str) -> std::io::Result<bool>;
}

/// The local filesystem (mounted source and destination trees).
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl PathProbe for LocalFs {
    fn exists(&self, path: &str) -> std::io::Result<bool> {
        Path::new(path).try_exists()
    }
}

impl<P: PathProbe + ?Sized> PathProbe for &P {
    fn exists(&self, path: &str) -> std::io::Result<bool> {
        (**self).exists(path)
    }
}
