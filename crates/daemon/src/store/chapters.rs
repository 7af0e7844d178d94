// chapters table access: whole-aggregate upsert, lookup, listing.
//
// A chapter and its paragraphs live in one row; paragraphs are a JSON
// column, so every save replaces the aggregate in a single statement.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use folio_common::types::{Chapter, ChapterId, ChapterSummary, Paragraph};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

pub struct ChapterTable;

impl ChapterTable {
    /// Insert or fully replace a chapter. Returns the stored revision.
    pub fn upsert(conn: &Connection, chapter: &Chapter) -> Result<i64> {
        let paragraphs = serde_json::to_string(&chapter.paragraphs)
            .with_context(|| format!("failed to encode paragraphs of chapter {}", chapter.id))?;

        conn.query_row(
            "INSERT INTO chapters (id, file, title, updated, paragraphs, revision) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1) \
             ON CONFLICT(id) DO UPDATE SET \
                 file = excluded.file, \
                 title = excluded.title, \
                 updated = excluded.updated, \
                 paragraphs = excluded.paragraphs, \
                 revision = chapters.revision + 1 \
             RETURNING revision",
            params![
                chapter.id,
                chapter.file.to_string_lossy().into_owned(),
                chapter.title,
                chapter.updated.to_rfc3339(),
                paragraphs,
            ],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to save chapter {}", chapter.id))
    }

    pub fn get(conn: &Connection, id: ChapterId) -> Result<Option<Chapter>> {
        conn.query_row(
            "SELECT id, file, title, updated, paragraphs FROM chapters WHERE id = ?1",
            params![id],
            row_to_chapter,
        )
        .optional()
        .with_context(|| format!("failed to load chapter {id}"))
    }

    /// Chapters matching `ids`, in the order requested. Unknown ids are
    /// skipped and repeated ids are returned once.
    pub fn find_by_ids(conn: &Connection, ids: &[ChapterId]) -> Result<Vec<Chapter>> {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut chapters = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(chapter) = Self::get(conn, *id)? {
                chapters.push(chapter);
            }
        }
        Ok(chapters)
    }

    pub fn list(conn: &Connection) -> Result<Vec<ChapterSummary>> {
        let mut stmt = conn
            .prepare("SELECT id, file, title, updated, paragraphs FROM chapters ORDER BY id ASC")
            .context("failed to prepare chapter listing query")?;

        let rows = stmt
            .query_map([], |row| row_to_chapter(row).map(|chapter| chapter.summary()))
            .context("failed to query chapters")?;

        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect chapter rows")
    }

    pub fn revision(conn: &Connection, id: ChapterId) -> Result<Option<i64>> {
        conn.query_row("SELECT revision FROM chapters WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .with_context(|| format!("failed to read revision of chapter {id}"))
    }
}

fn row_to_chapter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chapter> {
    let updated: String = row.get(3)?;
    let updated = DateTime::parse_from_rfc3339(&updated)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error)))?
        .with_timezone(&Utc);

    let paragraphs: String = row.get(4)?;
    let paragraphs: Vec<Paragraph> = serde_json::from_str(&paragraphs)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error)))?;

    Ok(Chapter {
        id: row.get(0)?,
        file: PathBuf::from(row.get::<_, String>(1)?),
        title: row.get(2)?,
        updated,
        paragraphs,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use folio_common::types::HistoryEntry;
    use tempfile::TempDir;

    use super::*;
    use crate::store::meta_db::MetaDb;

    fn setup() -> (MetaDb, TempDir) {
        let dir = TempDir::new().expect("tempdir should be created");
        let db = MetaDb::open(dir.path().join("folio.db")).expect("meta db should open");
        (db, dir)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
    }

    fn chapter(id: ChapterId, file: &str) -> Chapter {
        let mut chapter = Chapter::new(id, file, at(0));
        chapter.title = format!("Chapter {id}");
        chapter.paragraphs = vec![Paragraph {
            id: 1,
            source: "Hello\nWorld".to_string(),
            translation: "Bonjour\nMonde".to_string(),
            updated: at(0),
            history: vec![HistoryEntry {
                source: "Hi".to_string(),
                translation: "Salut".to_string(),
                message: "first pass".to_string(),
                date: at(-10),
            }],
        }];
        chapter
    }

    #[test]
    fn upsert_and_get_roundtrip_whole_aggregate() {
        let (db, _dir) = setup();
        let stored = chapter(1, "book/ch01.txt");

        let revision = ChapterTable::upsert(db.connection(), &stored).expect("upsert should succeed");
        assert_eq!(revision, 1);

        let loaded = ChapterTable::get(db.connection(), 1)
            .expect("query should succeed")
            .expect("chapter should exist");
        assert_eq!(loaded, stored);
    }

    #[test]
    fn upsert_replaces_paragraphs_and_bumps_revision() {
        let (db, _dir) = setup();
        ChapterTable::upsert(db.connection(), &chapter(1, "ch01.txt")).unwrap();

        let mut replaced = chapter(1, "ch01.txt");
        replaced.paragraphs.clear();
        replaced.updated = at(60);
        let revision = ChapterTable::upsert(db.connection(), &replaced).unwrap();
        assert_eq!(revision, 2);

        let loaded = ChapterTable::get(db.connection(), 1).unwrap().unwrap();
        assert!(loaded.paragraphs.is_empty());
        assert_eq!(loaded.updated, at(60));
        assert_eq!(ChapterTable::revision(db.connection(), 1).unwrap(), Some(2));
    }

    #[test]
    fn get_missing_chapter_returns_none() {
        let (db, _dir) = setup();
        assert!(ChapterTable::get(db.connection(), 42).unwrap().is_none());
        assert!(ChapterTable::revision(db.connection(), 42).unwrap().is_none());
    }

    #[test]
    fn find_by_ids_keeps_requested_order_and_skips_unknown() {
        let (db, _dir) = setup();
        for id in [1, 2, 3] {
            ChapterTable::upsert(db.connection(), &chapter(id, &format!("ch0{id}.txt"))).unwrap();
        }

        let found = ChapterTable::find_by_ids(db.connection(), &[3, 9, 1, 3]).unwrap();
        let ids: Vec<_> = found.iter().map(|chapter| chapter.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn list_returns_summaries_sorted_by_id() {
        let (db, _dir) = setup();
        ChapterTable::upsert(db.connection(), &chapter(2, "ch02.txt")).unwrap();
        ChapterTable::upsert(db.connection(), &chapter(1, "ch01.txt")).unwrap();

        let rows = ChapterTable::list(db.connection()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].file, PathBuf::from("ch02.txt"));
        assert_eq!(rows[1].paragraph_count, 1);
    }
}
