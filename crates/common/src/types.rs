// Core domain types shared across all folio crates.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ChapterId = i64;
pub type ParagraphId = i64;

/// Top-level versioned unit: an ordered sequence of paragraphs backed by a
/// file in the repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub id: ChapterId,
    /// Path of the exported file, relative to the repository root.
    pub file: PathBuf,
    #[serde(default)]
    pub title: String,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

impl Chapter {
    pub fn new(id: ChapterId, file: impl Into<PathBuf>, updated: DateTime<Utc>) -> Self {
        Self { id, file: file.into(), title: String::new(), updated, paragraphs: Vec::new() }
    }

    pub fn summary(&self) -> ChapterSummary {
        ChapterSummary {
            id: self.id,
            file: self.file.clone(),
            title: self.title.clone(),
            updated: self.updated,
            paragraph_count: self.paragraphs.len(),
        }
    }
}

/// Smallest versioned unit. `history` is append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paragraph {
    pub id: ParagraphId,
    pub source: String,
    pub translation: String,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Snapshot of a paragraph's content taken right before its source changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub source: String,
    pub translation: String,
    pub message: String,
    pub date: DateTime<Utc>,
}

/// Incoming paragraph content submitted by an editor.
///
/// Callers never send `updated` or `history`; both are owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ParagraphDraft {
    pub id: ParagraphId,
    pub source: String,
    #[serde(default)]
    pub translation: String,
}

impl ParagraphDraft {
    pub fn new(id: ParagraphId, source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self { id, source: source.into(), translation: translation.into() }
    }
}

/// Listing row for a chapter without its paragraphs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterSummary {
    pub id: ChapterId,
    pub file: PathBuf,
    pub title: String,
    pub updated: DateTime<Utc>,
    pub paragraph_count: usize,
}
