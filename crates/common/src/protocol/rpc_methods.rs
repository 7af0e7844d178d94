// RPC method names and their param/result payloads.

use serde::{Deserialize, Serialize};

use crate::types::{Chapter, ChapterId, ParagraphDraft};

// ── Daemon-internal ────────────────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";

// ── Chapter ────────────────────────────────────────────────────────
pub const CHAPTER_GET: &str = "chapter.get";
pub const CHAPTER_LIST: &str = "chapter.list";
pub const CHAPTER_PUT: &str = "chapter.put";
pub const CHAPTER_UPDATE_PARAGRAPHS: &str = "chapter.update_paragraphs";

// ── Sync ───────────────────────────────────────────────────────────
pub const SYNC_ORIGIN: &str = "sync.origin";
pub const SYNC_PUSH: &str = "sync.push";
pub const SYNC_RETRY_PUSH: &str = "sync.retry_push";
pub const SYNC_PULL: &str = "sync.pull";
pub const SYNC_STATUS: &str = "sync.status";

/// All methods the daemon dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DAEMON_SHUTDOWN,
    CHAPTER_GET,
    CHAPTER_LIST,
    CHAPTER_PUT,
    CHAPTER_UPDATE_PARAGRAPHS,
    SYNC_ORIGIN,
    SYNC_PUSH,
    SYNC_RETRY_PUSH,
    SYNC_PULL,
    SYNC_STATUS,
];

/// Key under which the last observed remote state is stored.
pub const ORIGIN_CURSOR_KEY: &str = "origin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterGetParams {
    pub id: ChapterId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterPutParams {
    pub chapter: Chapter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateParagraphsParams {
    pub id: ChapterId,
    pub message: String,
    pub paragraphs: Vec<ParagraphDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncPushParams {
    pub chapters: Vec<ChapterId>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncPullParams {
    pub message: String,
}

/// Outcome of a push. `committed` says whether this call created a commit;
/// `!pushed` with a `push_error` means local commits still wait for a
/// push-only retry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushReport {
    pub exported: Vec<ChapterId>,
    pub committed: bool,
    pub pushed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_error: Option<String>,
}

impl PushReport {
    pub fn needs_push_retry(&self) -> bool {
        !self.pushed && self.push_error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullReport {
    pub origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginResult {
    pub origin: Option<String>,
}

/// Observable position of the sync coordinator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Exporting,
    Committed,
    Pushed,
    PushFailed,
    Fetched,
    Merged,
    CursorUpdated,
    MergeConflict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStatusResult {
    pub phase: SyncPhase,
}
