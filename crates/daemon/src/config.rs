// Local configuration files for the daemon.
//
// Global config: `~/.folio/config.toml`
// Workspace config: `<repo>/.folio/workspace.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::security::{ensure_owner_only_dir, ensure_owner_only_file};

/// Root directory for folio global state: `~/.folio/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".folio"))
}

/// Path to the global config file: `~/.folio/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Path to the workspace config file: `<repo>/.folio/workspace.toml`.
pub fn workspace_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".folio").join("workspace.toml")
}

/// Default chapter database inside a repository: `<repo>/.folio/folio.db`.
pub fn default_db_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".folio").join("folio.db")
}

// ── Global config ──────────────────────────────────────────────────

/// Global daemon configuration at `~/.folio/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Repository the daemon exports into and syncs. Defaults to the
    /// current directory.
    pub repo_path: Option<PathBuf>,
    /// Chapter database override. Defaults to `<repo>/.folio/folio.db`.
    pub db_path: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load from `~/.folio/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_owner_only(path, &toml::to_string_pretty(self).map_err(ConfigError::Serialize)?)
    }

    /// Repository root, resolved against `cwd` when unset or relative.
    pub fn repo_root(&self, cwd: &Path) -> PathBuf {
        match &self.repo_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => cwd.join(path),
            None => cwd.to_path_buf(),
        }
    }

    pub fn db_path(&self, repo_root: &Path) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| default_db_path(repo_root))
    }
}

// ── Workspace config ───────────────────────────────────────────────

/// Per-repository configuration at `<repo>/.folio/workspace.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub git: GitConfig,
    pub sync: SyncConfig,
    pub export: ExportConfig,
}

impl WorkspaceConfig {
    /// Load from `<repo>/.folio/workspace.toml`. Returns defaults if the file
    /// doesn't exist.
    pub fn load(repo_root: &Path) -> Self {
        let path = workspace_config_path(repo_root);
        Self::load_from(&path).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    pub fn save(&self, repo_root: &Path) -> Result<(), ConfigError> {
        self.save_to(&workspace_config_path(repo_root))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_owner_only(path, &toml::to_string_pretty(self).map_err(ConfigError::Serialize)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Git remote name (defaults to `"origin"`).
    pub remote: String,
    /// Branch pushed to and merged from (defaults to `"main"`).
    pub branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { remote: "origin".into(), branch: "main".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound for one `sync.pull`, in seconds.
    pub pull_timeout_sec: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { pull_timeout_sec: 120 }
    }
}

impl SyncConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_sec.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Write chapter files through a temp file and rename.
    pub atomic: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { atomic: true }
    }
}

fn write_owner_only(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        ensure_owner_only_dir(parent)
            .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))?;
    }
    std::fs::write(path, contents).map_err(ConfigError::Io).and_then(|_| {
        ensure_owner_only_file(path)
            .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))
    })
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
