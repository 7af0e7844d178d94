use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::{GlobalConfig, WorkspaceConfig};
use crate::export::{ChapterExporter, PlainRenderer};
use crate::git::{GitWorker, VcsBackend};
use crate::rpc::methods::RpcServerState;
use crate::rpc::unix::serve_unix_until_shutdown;
use crate::startup::{bind_socket, remove_pid_file, write_pid_file, DaemonPaths};
use crate::store::SqliteStore;
use crate::sync::{CommittedContentCheck, SyncCoordinator};

/// Repository and database the daemon serves.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub repo_root: PathBuf,
    pub db_path: PathBuf,
    pub workspace: WorkspaceConfig,
}

impl DaemonSettings {
    /// Global config resolved against `cwd`, then the repository's workspace
    /// config.
    pub fn load(global: &GlobalConfig, cwd: &Path) -> Self {
        let repo_root = global.repo_root(cwd);
        Self {
            db_path: global.db_path(&repo_root),
            workspace: WorkspaceConfig::load(&repo_root),
            repo_root,
        }
    }
}

pub async fn run_standalone() -> Result<()> {
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let settings = DaemonSettings::load(&GlobalConfig::load(), &cwd);
    run_standalone_with(DaemonPaths::resolve()?, settings).await
}

/// Wire store, git, exporter and sync coordinator into RPC state.
pub fn build_state(settings: &DaemonSettings) -> Result<RpcServerState> {
    let store = Arc::new(SqliteStore::open(&settings.db_path).with_context(|| {
        format!("failed to open chapter database `{}`", settings.db_path.display())
    })?);

    let git = &settings.workspace.git;
    let vcs: Arc<dyn VcsBackend> = Arc::new(
        GitWorker::new(&settings.repo_root).with_remote(git.remote.clone(), git.branch.clone()),
    );
    let exporter = ChapterExporter::new(&settings.repo_root, Arc::new(PlainRenderer))
        .with_atomic(settings.workspace.export.atomic);
    let dirty = Arc::new(CommittedContentCheck::new(Arc::clone(&vcs), exporter.clone()));

    let sync = SyncCoordinator::new(store.clone(), store.clone(), vcs, exporter, dirty);
    Ok(RpcServerState::new(store, Arc::new(sync))
        .with_pull_timeout(settings.workspace.sync.pull_timeout()))
}

pub async fn run_standalone_with(paths: DaemonPaths, settings: DaemonSettings) -> Result<()> {
    let state = build_state(&settings)?;
    let listener = bind_socket(&paths.socket_path).await?;
    write_pid_file(&paths.pid_path)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    let state = state.with_shutdown_notifier(shutdown_tx.clone());
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = ctrl_c_tx.send(());
    });

    info!(
        socket_path = %paths.socket_path.display(),
        repo = %settings.repo_root.display(),
        remote = %settings.workspace.git.remote,
        branch = %settings.workspace.git.branch,
        "folio daemon started"
    );
    let result = serve_unix_until_shutdown(listener, state, shutdown_rx).await;
    cleanup_paths(&paths);
    result.context("folio daemon exited with error")
}

fn cleanup_paths(paths: &DaemonPaths) {
    remove_pid_file(&paths.pid_path);
    let _ = std::fs::remove_file(&paths.socket_path);
}
