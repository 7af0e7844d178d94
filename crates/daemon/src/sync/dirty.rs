// Dirty detection: does a chapter's rendered content differ from HEAD?

use std::sync::Arc;

use anyhow::{Context, Result};
use folio_common::types::Chapter;

use crate::export::ChapterExporter;
use crate::git::VcsBackend;

/// Decides whether a chapter needs exporting and committing.
pub trait DirtyCheck: Send + Sync {
    fn is_dirty(&self, chapter: &Chapter, message: &str) -> Result<bool>;
}

/// Compares freshly rendered content against the committed blob at `HEAD`.
/// A chapter whose file was never committed is dirty.
pub struct CommittedContentCheck {
    vcs: Arc<dyn VcsBackend>,
    exporter: ChapterExporter,
}

impl CommittedContentCheck {
    pub fn new(vcs: Arc<dyn VcsBackend>, exporter: ChapterExporter) -> Self {
        Self { vcs, exporter }
    }
}

impl DirtyCheck for CommittedContentCheck {
    fn is_dirty(&self, chapter: &Chapter, _message: &str) -> Result<bool> {
        let committed = self
            .vcs
            .committed_content(&chapter.file)
            .with_context(|| format!("failed to read committed content of chapter {}", chapter.id))?;

        Ok(match committed {
            Some(committed) => committed != self.exporter.render(chapter),
            None => true,
        })
    }
}
