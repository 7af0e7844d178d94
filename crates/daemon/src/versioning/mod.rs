// Paragraph versioning: merge an incoming paragraph set into stored state
// while keeping each paragraph's history append-only.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use folio_common::protocol::rpc_methods::UpdateParagraphsParams;
use folio_common::types::{Chapter, ChapterId, HistoryEntry, Paragraph, ParagraphDraft};
use folio_common::validation::ValidationError;
use thiserror::Error;
use tracing::info;

use crate::store::ChapterRepository;

/// Result of merging a submission into stored paragraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The submission after merging, in the caller's order.
    pub paragraphs: Vec<Paragraph>,
    /// New chapter-level timestamp; always `now`.
    pub updated: DateTime<Utc>,
    /// Number of history entries appended by this merge.
    pub recorded: usize,
}

/// Source text as compared for history purposes: newlines count as spaces.
pub fn normalize_source(source: &str) -> Cow<'_, str> {
    if source.contains('\n') {
        Cow::Owned(source.replace('\n', " "))
    } else {
        Cow::Borrowed(source)
    }
}

pub fn source_changed(old: &str, new: &str) -> bool {
    normalize_source(old) != normalize_source(new)
}

/// Merge `incoming` against `stored`.
///
/// The returned list is exactly the submission: stored paragraphs whose ids
/// are absent from `incoming` are dropped.
pub fn merge_update(
    stored: &[Paragraph],
    incoming: Vec<ParagraphDraft>,
    message: &str,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let mut by_id: HashMap<_, &Paragraph> = HashMap::with_capacity(stored.len());
    for paragraph in stored {
        by_id.entry(paragraph.id).or_insert(paragraph);
    }

    let mut recorded = 0;
    let paragraphs = incoming
        .into_iter()
        .map(|draft| match by_id.get(&draft.id) {
            None => Paragraph {
                id: draft.id,
                source: draft.source,
                translation: draft.translation,
                updated: now,
                history: Vec::new(),
            },
            Some(old) => {
                let mut merged = Paragraph {
                    source: draft.source,
                    translation: draft.translation,
                    ..(*old).clone()
                };

                if source_changed(&old.source, &merged.source) {
                    merged.updated = now;
                    merged.history.push(HistoryEntry {
                        source: old.source.clone(),
                        translation: old.translation.clone(),
                        message: message.to_string(),
                        date: now,
                    });
                    recorded += 1;
                }
                merged
            }
        })
        .collect();

    MergeOutcome { paragraphs, updated: now, recorded }
}

/// Apply a merge to a loaded chapter in place. Returns the number of history
/// entries recorded.
pub fn apply_update(
    chapter: &mut Chapter,
    incoming: Vec<ParagraphDraft>,
    message: &str,
    now: DateTime<Utc>,
) -> usize {
    let outcome = merge_update(&chapter.paragraphs, incoming, message, now);
    chapter.paragraphs = outcome.paragraphs;
    chapter.updated = outcome.updated;
    outcome.recorded
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("chapter {0} not found")]
    NotFound(ChapterId),
    #[error("chapter store failed: {0:#}")]
    Store(anyhow::Error),
}

/// Load a chapter, merge the submission and save the whole aggregate.
///
/// Validation happens before the store is touched. The merge is recomputed
/// from freshly loaded state, so retrying after a failed save is safe.
pub fn update_paragraphs(
    store: &dyn ChapterRepository,
    params: UpdateParagraphsParams,
    now: DateTime<Utc>,
) -> Result<Chapter, UpdateError> {
    params.validate()?;

    let mut chapter =
        store.find(params.id).map_err(UpdateError::Store)?.ok_or(UpdateError::NotFound(params.id))?;

    let dropped = chapter
        .paragraphs
        .iter()
        .filter(|stored| params.paragraphs.iter().all(|draft| draft.id != stored.id))
        .count();
    let recorded = apply_update(&mut chapter, params.paragraphs, &params.message, now);

    store.save(&chapter).map_err(UpdateError::Store)?;
    info!(
        chapter = chapter.id,
        paragraphs = chapter.paragraphs.len(),
        recorded,
        dropped,
        "updated chapter paragraphs"
    );
    Ok(chapter)
}
