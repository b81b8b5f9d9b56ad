//! Per-invocation scratch directory with guaranteed cleanup.

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

/// A per-invocation scratch directory.
///
/// The directory name encodes the function name and version plus a random
/// suffix, so concurrent invocations of the same function never share a
/// directory. Removal happens in `Drop`, which runs on every exit path of
/// the invocation (success, fault, timeout, or error propagation).
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<root>/{name}-{version}-{random}`, including parents.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if directory creation fails.
    pub fn create(root: &Path, name: &str, version: u64) -> io::Result<Self> {
        let path = root.join(format!("{name}-{version}-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Path to the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
        }
    }
}
