use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::VcsBackend;

/// Exit code git uses for fatal errors such as an unknown revision or path.
const GIT_FATAL_EXIT_CODE: i32 = 128;

/// Merge output that means the working tree holds conflicts, either fresh
/// ones or an earlier merge that was never concluded.
const MERGE_CONFLICT_MARKERS: &[&str] = &[
    "CONFLICT",
    "Automatic merge failed",
    "MERGE_HEAD exists",
    "not concluded your merge",
    "you have unmerged files",
    "unresolved conflict",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitWorkerError {
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stderr: String },
    MergeConflict { command: String, output: String },
}

impl GitWorkerError {
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, GitWorkerError::MergeConflict { .. })
    }
}

impl Display for GitWorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitWorkerError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitWorkerError::CommandFailed { command, code, stderr } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, stderr.trim())
            }
            GitWorkerError::MergeConflict { command, output } => {
                write!(f, "`{command}` stopped on conflicts: {}", output.trim())
            }
        }
    }
}

impl Error for GitWorkerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program).args(args).current_dir(cwd).output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs git subprocesses against one working tree and one remote branch.
#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    remote: String,
    branch: String,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self::with_executor(repo_path, ProcessCommandExecutor)
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            executor,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.remote = remote.into();
        self.branch = branch.into();
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, GitWorkerError> {
        let command = format!("git {}", args.join(" "));
        let result = self.executor.execute("git", &args, &self.repo_path).map_err(|error| {
            GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };

        Err(GitWorkerError::CommandFailed { command, code: result.code, stderr })
    }
}

impl<E: CommandExecutor> VcsBackend for GitWorker<E> {
    fn add(&self, path: &Path) -> Result<(), GitWorkerError> {
        self.run(vec!["add".to_string(), "--".to_string(), path_arg(path)]).map(drop)
    }

    fn commit(&self, message: &str) -> Result<(), GitWorkerError> {
        self.run(vec!["commit".to_string(), "-m".to_string(), message.to_string()]).map(drop)
    }

    fn push(&self) -> Result<(), GitWorkerError> {
        self.run(vec!["push".to_string(), self.remote.clone(), self.branch.clone()]).map(drop)
    }

    fn fetch(&self) -> Result<(), GitWorkerError> {
        self.run(vec!["fetch".to_string(), self.remote.clone()]).map(drop)
    }

    fn merge_remote(&self, message: &str) -> Result<(), GitWorkerError> {
        let args = vec![
            "merge".to_string(),
            "--no-edit".to_string(),
            "-m".to_string(),
            message.to_string(),
            self.tracking_ref(),
        ];
        let command = format!("git {}", args.join(" "));
        let result = self.executor.execute("git", &args, &self.repo_path).map_err(|error| {
            GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(());
        }

        // git reports conflicts on stdout, other failures on stderr.
        let output = format!("{}{}", result.stdout, result.stderr);
        if MERGE_CONFLICT_MARKERS.iter().any(|marker| output.contains(marker)) {
            return Err(GitWorkerError::MergeConflict { command, output });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };
        Err(GitWorkerError::CommandFailed { command, code: result.code, stderr })
    }

    fn remote_changes(&self) -> Result<String, GitWorkerError> {
        let output = self.run(vec!["rev-parse".to_string(), self.tracking_ref()])?;
        Ok(output.stdout.trim().to_string())
    }

    fn committed_content(&self, path: &Path) -> Result<Option<String>, GitWorkerError> {
        match self.run(vec!["show".to_string(), format!("HEAD:{}", path_arg(path))]) {
            Ok(output) => Ok(Some(output.stdout)),
            // Unborn HEAD or a path that was never committed.
            Err(GitWorkerError::CommandFailed { code: Some(GIT_FATAL_EXIT_CODE), .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
