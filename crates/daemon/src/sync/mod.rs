// Sync coordinator: export dirty chapters and drive commit/push and
// fetch/merge/cursor-update cycles against the repository.
//
// All operations against one repository are serialized by a single-flight
// guard; chapters within a push are processed strictly in order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use folio_common::protocol::rpc_methods::{PullReport, PushReport, SyncPhase, ORIGIN_CURSOR_KEY};
use folio_common::types::ChapterId;
use folio_common::validation::{require_chapters, require_message, ValidationError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::export::ChapterExporter;
use crate::git::{GitWorkerError, VcsBackend};
use crate::store::{ChapterRepository, CursorRepository};

pub mod dirty;

pub use dirty::{CommittedContentCheck, DirtyCheck};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("store access failed: {0:#}")]
    Store(anyhow::Error),
    #[error("dirty check failed for chapter {chapter}: {error:#}")]
    DirtyCheck { chapter: ChapterId, error: anyhow::Error },
    #[error("failed to export chapter {chapter}: {error:#}")]
    Export { chapter: ChapterId, error: anyhow::Error },
    #[error("git operation failed: {0}")]
    Git(#[from] GitWorkerError),
    #[error("merge stopped on conflicts; resolve them in the working tree and pull again: {0}")]
    MergeConflict(GitWorkerError),
    #[error("a merge is still unresolved; resolve it in the working tree and pull again")]
    UnresolvedMerge,
}

impl SyncError {
    /// Stable machine-readable code for RPC clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Store(_) => "STORE_FAILED",
            Self::DirtyCheck { .. } => "DIRTY_CHECK_FAILED",
            Self::Export { .. } => "EXPORT_FAILED",
            Self::Git(_) => "GIT_FAILED",
            Self::MergeConflict(_) | Self::UnresolvedMerge => "MERGE_CONFLICT",
        }
    }
}

pub struct SyncCoordinator {
    chapters: Arc<dyn ChapterRepository>,
    cursor: Arc<dyn CursorRepository>,
    vcs: Arc<dyn VcsBackend>,
    exporter: ChapterExporter,
    dirty: Arc<dyn DirtyCheck>,
    flight: Mutex<()>,
    phase: Mutex<SyncPhase>,
}

impl SyncCoordinator {
    pub fn new(
        chapters: Arc<dyn ChapterRepository>,
        cursor: Arc<dyn CursorRepository>,
        vcs: Arc<dyn VcsBackend>,
        exporter: ChapterExporter,
        dirty: Arc<dyn DirtyCheck>,
    ) -> Self {
        Self {
            chapters,
            cursor,
            vcs,
            exporter,
            dirty,
            flight: Mutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last observed remote state, if a pull has ever completed.
    pub fn origin(&self) -> Result<Option<String>, SyncError> {
        self.cursor.get(ORIGIN_CURSOR_KEY).map_err(SyncError::Store)
    }

    /// Export and commit every dirty chapter among `ids` as one commit, then
    /// push it.
    ///
    /// A push failure after the commit is not an `Err`: the report comes
    /// back with `pushed == false` and a `push_error` so the caller can retry
    /// the push alone with [`SyncCoordinator::retry_push`]. When an earlier
    /// push is still pending and nothing new is dirty, the pending commit is
    /// pushed instead. Pushing is refused while a merge is unresolved.
    pub fn sync_push(&self, ids: &[ChapterId], message: &str) -> Result<PushReport, SyncError> {
        require_chapters(ids)?;
        require_message(message)?;

        let _flight = self.acquire_flight();
        let resting = self.resting_phase();
        if resting == SyncPhase::MergeConflict {
            warn!("push refused while a merge is unresolved");
            return Err(SyncError::UnresolvedMerge);
        }
        let chapters = self.chapters.find_by_ids(ids).map_err(SyncError::Store)?;

        self.transition(SyncPhase::Exporting);
        let mut exported = Vec::new();
        for chapter in &chapters {
            let step = self.export_if_dirty(chapter, message);
            match step {
                Ok(true) => exported.push(chapter.id),
                Ok(false) => debug!(chapter = chapter.id, "chapter clean, skipping"),
                Err(error) => {
                    self.transition(resting);
                    warn!(chapter = chapter.id, ?exported, %error, "push aborted before commit");
                    return Err(error);
                }
            }
        }

        if exported.is_empty() {
            if resting == SyncPhase::PushFailed {
                info!(requested = ids.len(), "no dirty chapters, pushing pending commit");
                return Ok(self.push_committed(exported, false));
            }
            self.transition(SyncPhase::Idle);
            info!(requested = ids.len(), "no dirty chapters, nothing to commit");
            return Ok(PushReport::default());
        }

        if let Err(error) = self.vcs.commit(message) {
            self.transition(resting);
            return Err(error.into());
        }
        self.transition(SyncPhase::Committed);

        Ok(self.push_committed(exported, true))
    }

    /// Push already-committed work without exporting or committing again.
    pub fn retry_push(&self) -> Result<(), SyncError> {
        let _flight = self.acquire_flight();
        if self.resting_phase() == SyncPhase::MergeConflict {
            warn!("retried push refused while a merge is unresolved");
            return Err(SyncError::UnresolvedMerge);
        }
        match self.vcs.push() {
            Ok(()) => {
                self.transition(SyncPhase::Pushed);
                self.transition(SyncPhase::Idle);
                info!("retried push succeeded");
                Ok(())
            }
            Err(error) => {
                self.transition(SyncPhase::PushFailed);
                warn!(%error, "retried push failed");
                Err(error.into())
            }
        }
    }

    /// Fetch, merge the remote branch with `message`, then record the remote
    /// state under the origin cursor. The cursor is only written once the
    /// merge has succeeded, and only a completed merge clears an earlier
    /// conflict.
    pub fn sync_pull(&self, message: &str) -> Result<PullReport, SyncError> {
        require_message(message)?;

        let _flight = self.acquire_flight();
        let resting = self.resting_phase();
        let merged_resting = match resting {
            SyncPhase::PushFailed => SyncPhase::PushFailed,
            _ => SyncPhase::Idle,
        };

        if let Err(error) = self.vcs.fetch() {
            self.transition(resting);
            return Err(error.into());
        }
        self.transition(SyncPhase::Fetched);

        if let Err(error) = self.vcs.merge_remote(message) {
            if error.is_merge_conflict() {
                self.transition(SyncPhase::MergeConflict);
                warn!(%error, "pull stopped on merge conflicts");
                return Err(SyncError::MergeConflict(error));
            }
            self.transition(resting);
            return Err(error.into());
        }
        self.transition(SyncPhase::Merged);

        let origin = match self.vcs.remote_changes() {
            Ok(origin) => origin,
            Err(error) => {
                self.transition(merged_resting);
                return Err(error.into());
            }
        };
        if let Err(error) = self.cursor.set(ORIGIN_CURSOR_KEY, &origin) {
            self.transition(merged_resting);
            return Err(SyncError::Store(error));
        }
        self.transition(SyncPhase::CursorUpdated);
        self.transition(merged_resting);

        info!(%origin, "pulled remote changes");
        Ok(PullReport { origin })
    }

    fn push_committed(&self, exported: Vec<ChapterId>, committed: bool) -> PushReport {
        match self.vcs.push() {
            Ok(()) => {
                self.transition(SyncPhase::Pushed);
                self.transition(SyncPhase::Idle);
                info!(chapters = ?exported, committed, "pushed local commits");
                PushReport { exported, committed, pushed: true, push_error: None }
            }
            Err(error) => {
                self.transition(SyncPhase::PushFailed);
                warn!(chapters = ?exported, committed, %error, "push failed, local commits pending");
                PushReport { exported, committed, pushed: false, push_error: Some(error.to_string()) }
            }
        }
    }

    /// Phase to fall back to when a call stops early. A pending push and an
    /// unresolved merge outlive calls that do not clear them.
    fn resting_phase(&self) -> SyncPhase {
        match self.phase() {
            phase @ (SyncPhase::PushFailed | SyncPhase::MergeConflict) => phase,
            _ => SyncPhase::Idle,
        }
    }

    fn export_if_dirty(
        &self,
        chapter: &folio_common::types::Chapter,
        message: &str,
    ) -> Result<bool, SyncError> {
        let dirty = self
            .dirty
            .is_dirty(chapter, message)
            .map_err(|error| SyncError::DirtyCheck { chapter: chapter.id, error })?;
        if !dirty {
            return Ok(false);
        }

        // Export before staging so the index holds the freshly rendered file.
        self.exporter
            .export(chapter)
            .map_err(|error| SyncError::Export { chapter: chapter.id, error })?;
        self.vcs.add(&chapter.file)?;
        Ok(true)
    }

    fn acquire_flight(&self) -> MutexGuard<'_, ()> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: SyncPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*phase, to = ?next, "sync phase");
        *phase = next;
    }
}
