// Git plumbing: subprocess worker and the backend contract used by sync.

use std::path::Path;

pub mod worker;

pub use worker::{GitWorker, GitWorkerError};

/// Version-control primitives consumed by the sync coordinator.
///
/// Each call is atomic from the caller's perspective and is never retried
/// internally. Paths are relative to the repository root.
pub trait VcsBackend: Send + Sync {
    fn add(&self, path: &Path) -> Result<(), GitWorkerError>;

    fn commit(&self, message: &str) -> Result<(), GitWorkerError>;

    fn push(&self) -> Result<(), GitWorkerError>;

    fn fetch(&self) -> Result<(), GitWorkerError>;

    /// Merge the fetched remote branch into the working tree using
    /// `message` as the merge-commit message.
    fn merge_remote(&self, message: &str) -> Result<(), GitWorkerError>;

    /// Opaque descriptor of the current remote state (a commit id for git).
    fn remote_changes(&self) -> Result<String, GitWorkerError>;

    /// Content of `path` at `HEAD`, or `None` if it was never committed.
    fn committed_content(&self, path: &Path) -> Result<Option<String>, GitWorkerError>;
}
