// Agent configuration: `<repo>/.reposync/config.toml`.
//
// Every field has a default, so a missing or unparsable file means
// "sync origin/main on the stock cadence". Read once at startup and
// passed by value to each component; nothing re-reads it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path to the config file inside a repository.
pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".reposync").join("config.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Git remote to reconcile against.
    pub remote: String,
    /// Branch to track on the remote.
    pub branch: String,
    /// Seconds between scheduled pull attempts, and between scheduled
    /// push attempts.
    pub sync_interval_secs: u64,
    /// Seconds between scheduled commit passes.
    pub commit_interval_secs: u64,
    /// Seconds the console waits for operator input before yielding the
    /// display back to the log.
    pub prompt_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            branch: "main".into(),
            sync_interval_secs: 600,
            commit_interval_secs: 120,
            prompt_timeout_secs: 5,
        }
    }
}

impl SyncConfig {
    /// Load from `<repo>/.reposync/config.toml`. Returns defaults if the
    /// file doesn't exist or can't be parsed.
    pub fn load(repo_root: &Path) -> Self {
        Self::load_from(&config_path(repo_root)).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }
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
