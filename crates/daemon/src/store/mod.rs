// Persistence: SQLite folio.db holding chapter aggregates and the origin cursor.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use folio_common::types::{Chapter, ChapterId, ChapterSummary};

pub mod chapters;
pub mod cursor;
pub mod meta_db;

use chapters::ChapterTable;
use cursor::CursorTable;
use meta_db::MetaDb;

/// Load/save contract for chapter aggregates.
pub trait ChapterRepository: Send + Sync {
    /// Chapters matching `ids` in requested order; unknown ids are skipped.
    fn find_by_ids(&self, ids: &[ChapterId]) -> Result<Vec<Chapter>>;

    fn find(&self, id: ChapterId) -> Result<Option<Chapter>>;

    /// Atomically replace the whole stored aggregate.
    fn save(&self, chapter: &Chapter) -> Result<()>;

    fn list(&self) -> Result<Vec<ChapterSummary>>;
}

/// Single-value-per-key store for the last observed remote state.
pub trait CursorRepository: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed implementation of both repositories.
#[derive(Debug)]
pub struct SqliteStore {
    db: Mutex<MetaDb>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(MetaDb::open(path)?))
    }

    pub fn new(db: MetaDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> MutexGuard<'_, MetaDb> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChapterRepository for SqliteStore {
    fn find_by_ids(&self, ids: &[ChapterId]) -> Result<Vec<Chapter>> {
        ChapterTable::find_by_ids(self.db().connection(), ids)
    }

    fn find(&self, id: ChapterId) -> Result<Option<Chapter>> {
        ChapterTable::get(self.db().connection(), id)
    }

    fn save(&self, chapter: &Chapter) -> Result<()> {
        let revision = ChapterTable::upsert(self.db().connection(), chapter)?;
        tracing::debug!(chapter = chapter.id, revision, "saved chapter");
        Ok(())
    }

    fn list(&self) -> Result<Vec<ChapterSummary>> {
        ChapterTable::list(self.db().connection())
    }
}

impl CursorRepository for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        CursorTable::get(self.db().connection(), key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        CursorTable::set(self.db().connection(), key, value)
    }
}
