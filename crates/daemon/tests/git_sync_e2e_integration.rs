use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use folio_common::protocol::rpc_methods::{PushReport, SyncPhase, UpdateParagraphsParams};
use folio_common::types::{Chapter, Paragraph, ParagraphDraft};
use folio_daemon::export::{ChapterExporter, PlainRenderer};
use folio_daemon::git::{GitWorker, VcsBackend};
use folio_daemon::store::{ChapterRepository, SqliteStore};
use folio_daemon::sync::{CommittedContentCheck, SyncCoordinator, SyncError};
use folio_daemon::versioning::update_paragraphs;
use tempfile::TempDir;

struct Harness {
    temp: TempDir,
    remote: PathBuf,
    repo: PathBuf,
    store: Arc<SqliteStore>,
    sync: SyncCoordinator,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().expect("tempdir should be created");
        let remote = temp.path().join("remote.git");
        let repo = temp.path().join("repo");

        run_git(temp.path(), &["init", "--bare", path_str(&remote)]);
        run_git(temp.path(), &["init", "-b", "main", path_str(&repo)]);
        configure_identity(&repo, "Folio Author");
        run_git(&repo, &["remote", "add", "origin", path_str(&remote)]);

        std::fs::write(repo.join("README.md"), "# Novel\n").expect("seed file should be written");
        run_git(&repo, &["add", "."]);
        run_git(&repo, &["commit", "-m", "initial commit"]);
        run_git(&repo, &["push", "-u", "origin", "main"]);

        let store = Arc::new(
            SqliteStore::open(temp.path().join("state").join("folio.db"))
                .expect("store should open"),
        );
        let vcs: Arc<dyn VcsBackend> = Arc::new(GitWorker::new(&repo));
        let exporter = ChapterExporter::new(&repo, Arc::new(PlainRenderer));
        let dirty = Arc::new(CommittedContentCheck::new(Arc::clone(&vcs), exporter.clone()));
        let sync = SyncCoordinator::new(store.clone(), store.clone(), vcs, exporter, dirty);

        Self { temp, remote, repo, store, sync }
    }

    fn seed(&self, id: i64, file: &str, sources: &[&str]) {
        let created = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp");
        let mut chapter = Chapter::new(id, file, created);
        chapter.paragraphs = sources
            .iter()
            .enumerate()
            .map(|(index, source)| Paragraph {
                id: index as i64 + 1,
                source: source.to_string(),
                translation: String::new(),
                updated: created,
                history: Vec::new(),
            })
            .collect();
        self.store.save(&chapter).expect("chapter should save");
    }

    fn edit(&self, id: i64, sources: &[&str]) {
        let params = UpdateParagraphsParams {
            id,
            message: "revise".to_string(),
            paragraphs: sources
                .iter()
                .enumerate()
                .map(|(index, source)| ParagraphDraft::new(index as i64 + 1, *source, ""))
                .collect(),
        };
        update_paragraphs(self.store.as_ref(), params, Utc::now()).expect("update should apply");
    }

    /// Clone of the remote acting as a second writer.
    fn peer(&self) -> PathBuf {
        let peer = self.temp.path().join("peer");
        if !peer.exists() {
            run_git(
                self.temp.path(),
                &["clone", "-b", "main", path_str(&self.remote), path_str(&peer)],
            );
            configure_identity(&peer, "Folio Reviewer");
        } else {
            run_git(&peer, &["pull", "origin", "main"]);
        }
        peer
    }

    fn remote_commit_count(&self) -> usize {
        run_git_capture(&self.remote, &["rev-list", "--count", "main"])
            .trim()
            .parse()
            .expect("commit count should parse")
    }

    fn remote_file(&self, path: &str) -> String {
        run_git_capture(&self.remote, &["show", &format!("main:{path}")])
    }

    fn remote_head(&self) -> String {
        run_git_capture(&self.remote, &["rev-parse", "main"]).trim().to_string()
    }
}

#[test]
fn push_commits_all_dirty_chapters_in_one_commit() {
    let harness = Harness::new();
    harness.seed(1, "ch01.txt", &["It was a dark night.", "Rain fell."]);
    harness.seed(2, "part2/ch02.txt", &["Morning came."]);

    let report = harness.sync.sync_push(&[1, 2], "add first chapters").expect("push should work");

    assert_eq!(
        report,
        PushReport { exported: vec![1, 2], committed: true, pushed: true, push_error: None }
    );
    assert_eq!(harness.remote_commit_count(), 2);
    assert_eq!(harness.remote_file("ch01.txt"), "It was a dark night.\n\nRain fell.\n");
    assert_eq!(harness.remote_file("part2/ch02.txt"), "Morning came.\n");
}

#[test]
fn unchanged_chapters_produce_no_commit() {
    let harness = Harness::new();
    harness.seed(1, "ch01.txt", &["one"]);
    harness.seed(2, "ch02.txt", &["two"]);
    harness.sync.sync_push(&[1, 2], "initial export").expect("first push should work");

    let report = harness.sync.sync_push(&[1, 2], "nothing new").expect("second push should work");

    assert_eq!(report, PushReport::default());
    assert_eq!(harness.remote_commit_count(), 2);
}

#[test]
fn only_edited_chapter_is_committed() {
    let harness = Harness::new();
    harness.seed(1, "ch01.txt", &["one"]);
    harness.seed(2, "ch02.txt", &["two"]);
    harness.sync.sync_push(&[1, 2], "initial export").expect("first push should work");

    harness.edit(1, &["one, revised"]);
    let report = harness.sync.sync_push(&[1, 2], "revise chapter one").expect("push should work");

    assert_eq!(report.exported, vec![1]);
    let changed =
        run_git_capture(&harness.repo, &["diff-tree", "--no-commit-id", "--name-only", "-r", "HEAD"]);
    assert_eq!(changed.trim(), "ch01.txt");
    assert_eq!(harness.remote_file("ch01.txt"), "one, revised\n");
}

#[test]
fn pull_merges_remote_work_and_records_origin() {
    let harness = Harness::new();
    assert_eq!(harness.sync.origin().expect("origin should load"), None);

    let peer = harness.peer();
    std::fs::write(peer.join("notes.txt"), "glossary\n").expect("peer file should be written");
    run_git(&peer, &["add", "notes.txt"]);
    run_git(&peer, &["commit", "-m", "add notes"]);
    run_git(&peer, &["push", "origin", "main"]);

    let report = harness.sync.sync_pull("merge upstream").expect("pull should work");

    assert_eq!(report.origin, harness.remote_head());
    assert_eq!(harness.sync.origin().expect("origin should load"), Some(report.origin));
    assert_eq!(
        std::fs::read_to_string(harness.repo.join("notes.txt")).expect("merged file"),
        "glossary\n"
    );
    assert_eq!(harness.sync.phase(), SyncPhase::Idle);
}

#[test]
fn rejected_push_then_conflicting_pull_keeps_prior_origin() {
    let harness = Harness::new();
    harness.seed(1, "ch01.txt", &["original"]);
    harness.sync.sync_push(&[1], "initial export").expect("first push should work");
    let first = harness.sync.sync_pull("sync").expect("up-to-date pull should work");

    let peer = harness.peer();
    std::fs::write(peer.join("ch01.txt"), "edited by reviewer\n").expect("peer edit");
    run_git(&peer, &["commit", "-am", "reviewer edit"]);
    run_git(&peer, &["push", "origin", "main"]);

    harness.edit(1, &["edited by author"]);
    let report = harness.sync.sync_push(&[1], "author edit").expect("partial failure is a report");
    assert!(report.committed);
    assert!(!report.pushed);
    assert!(report.push_error.is_some());
    assert_eq!(harness.sync.phase(), SyncPhase::PushFailed);

    let error = harness.sync.sync_pull("merge reviewer").expect_err("pull should conflict");
    assert!(matches!(error, SyncError::MergeConflict(_)), "unexpected error: {error}");
    assert_eq!(harness.sync.phase(), SyncPhase::MergeConflict);
    assert_eq!(harness.sync.origin().expect("origin should load"), Some(first.origin.clone()));

    let error = harness.sync.sync_pull("merge again").expect_err("unfinished merge still conflicts");
    assert!(matches!(error, SyncError::MergeConflict(_)), "unexpected error: {error}");
    assert_eq!(harness.sync.phase(), SyncPhase::MergeConflict);

    let error = harness.sync.sync_push(&[1], "another edit").expect_err("push is refused");
    assert!(matches!(error, SyncError::UnresolvedMerge), "unexpected error: {error}");
    assert_eq!(harness.sync.phase(), SyncPhase::MergeConflict);
    assert_eq!(harness.sync.origin().expect("origin should load"), Some(first.origin));
}

fn configure_identity(repo: &Path, name: &str) {
    run_git(repo, &["config", "user.name", name]);
    run_git(repo, &["config", "user.email", "folio@example.test"]);
    run_git(repo, &["config", "commit.gpgsign", "false"]);
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

fn run_git(cwd: &Path, args: &[&str]) {
    run_git_capture(cwd, args);
}

fn run_git_capture(cwd: &Path, args: &[&str]) -> String {
    let output =
        Command::new("git").args(args).current_dir(cwd).output().expect("git command should run");
    assert!(
        output.status.success(),
        "git {:?} failed:\nstdout: {}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf8 output")
}
