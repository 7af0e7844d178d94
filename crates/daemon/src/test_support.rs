// Shared fakes for unit tests.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use folio_common::types::{Chapter, ChapterId, Paragraph};
use tempfile::TempDir;

use crate::export::{ChapterExporter, PlainRenderer};
use crate::git::{GitWorkerError, VcsBackend};
use crate::rpc::methods::RpcServerState;
use crate::store::{ChapterRepository, SqliteStore};
use crate::sync::{DirtyCheck, SyncCoordinator};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
}

pub fn chapter(id: ChapterId, file: &str, sources: &[&str]) -> Chapter {
    let mut chapter = Chapter::new(id, file, at(0));
    chapter.title = format!("Chapter {id}");
    chapter.paragraphs = sources
        .iter()
        .enumerate()
        .map(|(index, source)| Paragraph {
            id: index as i64 + 1,
            source: source.to_string(),
            translation: String::new(),
            updated: at(0),
            history: Vec::new(),
        })
        .collect();
    chapter
}

pub fn temp_store() -> (Arc<SqliteStore>, TempDir) {
    let dir = TempDir::new().expect("tempdir should be created");
    let store = SqliteStore::open(dir.path().join(".folio").join("folio.db"))
        .expect("store should open");
    (Arc::new(store), dir)
}

pub fn seed(store: &SqliteStore, chapters: &[Chapter]) {
    for chapter in chapters {
        store.save(chapter).expect("seed chapter should save");
    }
}

/// Records every VCS call; individual operations can be scripted to fail.
#[derive(Default, Clone)]
pub struct RecordingVcs {
    calls: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<VecDeque<(String, GitWorkerError)>>>,
    remote_state: Arc<Mutex<String>>,
    fetch_delay: Arc<Mutex<Duration>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        let vcs = Self::default();
        *vcs.remote_state.lock().unwrap() = "0000000".to_string();
        vcs
    }

    pub fn with_remote_state(self, state: &str) -> Self {
        *self.remote_state.lock().unwrap() = state.to_string();
        self
    }

    /// Block every fetch for `delay` before it is recorded.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = delay;
        self
    }

    /// Make the next call to `operation` fail with `error`.
    pub fn fail_next(self, operation: &str, error: GitWorkerError) -> Self {
        self.failures.lock().unwrap().push_back((operation.to_string(), error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|call| call.split(' ').next() == Some(operation)).count()
    }

    fn record(&self, operation: &str, detail: Option<String>) -> Result<(), GitWorkerError> {
        let entry = match detail {
            Some(detail) => format!("{operation} {detail}"),
            None => operation.to_string(),
        };
        self.calls.lock().unwrap().push(entry);

        let mut failures = self.failures.lock().unwrap();
        if let Some(position) = failures.iter().position(|(name, _)| name == operation) {
            let (_, error) = failures.remove(position).expect("position is in range");
            return Err(error);
        }
        Ok(())
    }
}

pub fn command_failed(command: &str, stderr: &str) -> GitWorkerError {
    GitWorkerError::CommandFailed {
        command: command.to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

impl VcsBackend for RecordingVcs {
    fn add(&self, path: &Path) -> Result<(), GitWorkerError> {
        self.record("add", Some(path.display().to_string()))
    }

    fn commit(&self, message: &str) -> Result<(), GitWorkerError> {
        self.record("commit", Some(message.to_string()))
    }

    fn push(&self) -> Result<(), GitWorkerError> {
        self.record("push", None)
    }

    fn fetch(&self) -> Result<(), GitWorkerError> {
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.record("fetch", None)
    }

    fn merge_remote(&self, message: &str) -> Result<(), GitWorkerError> {
        self.record("merge", Some(message.to_string()))
    }

    fn remote_changes(&self) -> Result<String, GitWorkerError> {
        self.record("remote_changes", None)?;
        Ok(self.remote_state.lock().unwrap().clone())
    }

    fn committed_content(&self, _path: &Path) -> Result<Option<String>, GitWorkerError> {
        Ok(None)
    }
}

/// Dirty check driven by a fixed set of chapter ids.
pub struct FixedDirty(pub HashSet<ChapterId>);

impl FixedDirty {
    pub fn of(ids: &[ChapterId]) -> Self {
        Self(ids.iter().copied().collect())
    }
}

impl DirtyCheck for FixedDirty {
    fn is_dirty(&self, chapter: &Chapter, _message: &str) -> Result<bool> {
        Ok(self.0.contains(&chapter.id))
    }
}

/// RPC state over a temp store whose repository root is the temp dir.
pub fn rpc_state(
    vcs: RecordingVcs,
    dirty: &[ChapterId],
) -> (RpcServerState, Arc<SqliteStore>, TempDir) {
    let (store, dir) = temp_store();
    let sync = SyncCoordinator::new(
        store.clone(),
        store.clone(),
        Arc::new(vcs),
        ChapterExporter::new(dir.path(), Arc::new(PlainRenderer)),
        Arc::new(FixedDirty::of(dirty)),
    );
    (RpcServerState::new(store.clone(), Arc::new(sync)), store, dir)
}
