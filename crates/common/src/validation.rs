// Boundary validation for request payloads.
//
// Every check here runs before any store or repository access, so a
// rejected request has no side effects.

use std::collections::HashSet;

use thiserror::Error;

use crate::protocol::rpc_methods::{
    ChapterPutParams, SyncPullParams, SyncPushParams, UpdateParagraphsParams,
};
use crate::types::{ChapterId, ParagraphDraft, ParagraphId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("at least one chapter id is required")]
    EmptyChapterSet,
    #[error("paragraph id {0} appears more than once")]
    DuplicateParagraph(ParagraphId),
}

/// Rejects messages that are empty or whitespace-only.
pub fn require_message(message: &str) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(())
}

pub fn require_chapters(ids: &[ChapterId]) -> Result<(), ValidationError> {
    if ids.is_empty() {
        return Err(ValidationError::EmptyChapterSet);
    }
    Ok(())
}

/// An empty paragraph set is valid and means "remove every paragraph".
pub fn require_unique_paragraphs(paragraphs: &[ParagraphDraft]) -> Result<(), ValidationError> {
    require_unique_ids(paragraphs.iter().map(|paragraph| paragraph.id))
}

fn require_unique_ids(ids: impl IntoIterator<Item = ParagraphId>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateParagraph(id));
        }
    }
    Ok(())
}

impl ChapterPutParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_unique_ids(self.chapter.paragraphs.iter().map(|paragraph| paragraph.id))
    }
}

impl UpdateParagraphsParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_message(&self.message)?;
        require_unique_paragraphs(&self.paragraphs)
    }
}

impl SyncPushParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_chapters(&self.chapters)?;
        require_message(&self.message)
    }
}

impl SyncPullParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_message(&self.message)
    }
}
