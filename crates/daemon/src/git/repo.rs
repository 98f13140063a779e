// Git repository operations over a mockable command executor.
//
// Every operation shells out to the `git` CLI synchronously and either
// succeeds with captured output or fails with the command line, exit code
// and stderr. Callers decide what a failure means; nothing here retries.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

/// Hex digits of the content identifier embedded in sync commit messages.
const CONTENT_IDENT_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    EmptyStagePaths,
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stderr: String },
    UnexpectedOutput { command: String, message: String },
}

impl Display for GitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::EmptyStagePaths => write!(f, "git add requires at least one path"),
            GitError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitError::CommandFailed { command, code, stderr } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, stderr.trim())
            }
            GitError::UnexpectedOutput { command, message } => {
                write!(f, "`{command}` produced unexpected output: {message}")
            }
        }
    }
}

impl Error for GitError {}

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

/// One local-only commit, as reported by `git log --oneline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub short_hash: String,
    pub summary: String,
}

/// Resolve the repository root for the current working directory.
pub fn discover_toplevel<E: CommandExecutor>(executor: &E) -> Result<PathBuf, GitError> {
    let args = vec!["rev-parse".to_string(), "--show-toplevel".to_string()];
    let command = "git rev-parse --show-toplevel".to_string();
    let result = executor.execute("git", &args, Path::new(".")).map_err(|error| {
        GitError::SpawnFailed { command: command.clone(), message: error.to_string() }
    })?;

    if !result.success {
        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };
        return Err(GitError::CommandFailed { command, code: result.code, stderr });
    }

    let root = result.stdout.trim();
    if root.is_empty() {
        return Err(GitError::UnexpectedOutput {
            command,
            message: "no repository root reported".to_string(),
        });
    }
    Ok(PathBuf::from(root))
}

#[derive(Debug, Clone)]
pub struct GitRepo<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    executor: E,
}

impl GitRepo<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitRepo<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn fetch_all(&self) -> Result<GitOutput, GitError> {
        self.run(vec!["fetch".to_string(), "--all".to_string()])
    }

    pub fn pull(&self, remote: &str, branch: &str) -> Result<GitOutput, GitError> {
        self.run(vec!["pull".to_string(), remote.to_string(), branch.to_string()])
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<GitOutput, GitError> {
        self.run(vec!["push".to_string(), remote.to_string(), branch.to_string()])
    }

    pub fn stage<S: AsRef<str>>(&self, paths: &[S]) -> Result<GitOutput, GitError> {
        if paths.is_empty() {
            return Err(GitError::EmptyStagePaths);
        }

        let mut args = vec!["add".to_string()];
        args.extend(paths.iter().map(|path| path.as_ref().to_string()));
        self.run(args)
    }

    pub fn commit(&self, message: &str) -> Result<GitOutput, GitError> {
        self.run(vec!["commit".to_string(), "-m".to_string(), message.to_string()])
    }

    /// Move the branch pointer without touching the index or working tree.
    pub fn soft_reset_to(&self, reference: &str) -> Result<GitOutput, GitError> {
        self.run(vec!["reset".to_string(), "--soft".to_string(), reference.to_string()])
    }

    /// Shelve the given paths, untracked files included.
    pub fn stash_push<S: AsRef<str>>(&self, paths: &[S]) -> Result<GitOutput, GitError> {
        let mut args = vec!["stash".to_string(), "push".to_string(), "-u".to_string()];
        args.extend(paths.iter().map(|path| path.as_ref().to_string()));
        self.run(args)
    }

    /// Reapply a stash entry, leaving it in the stash list.
    pub fn stash_apply(&self, stash_ref: &str) -> Result<GitOutput, GitError> {
        self.run(vec!["stash".to_string(), "apply".to_string(), stash_ref.to_string()])
    }

    /// Paths with uncommitted changes, as reported by `git status --porcelain`.
    pub fn dirty_files(&self) -> Result<Vec<String>, GitError> {
        let output = self.run(vec!["status".to_string(), "--porcelain".to_string()])?;
        Ok(parse_porcelain(&output.stdout))
    }

    /// Commits reachable in `range` (`a..b` syntax), oldest first.
    pub fn log_range(&self, range: &str) -> Result<Vec<CommitRecord>, GitError> {
        let output =
            self.run(vec!["log".to_string(), range.to_string(), "--oneline".to_string()])?;
        Ok(parse_oneline_log(&output.stdout))
    }

    /// Commits on `HEAD` that the remote tracking branch does not have.
    pub fn local_commits(&self, remote: &str, branch: &str) -> Result<Vec<CommitRecord>, GitError> {
        self.log_range(&format!("{remote}/{branch}..HEAD"))
    }

    /// Whether the remote tracking branch has commits `HEAD` lacks.
    /// Call `fetch_all` first for a current answer.
    pub fn remote_ahead(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        let records = self.log_range(&format!("HEAD..{remote}/{branch}"))?;
        Ok(!records.is_empty())
    }

    /// Content-derived identifier for the pending change set: a truncated
    /// SHA-256 of the verbose status output. Tags sync commits for
    /// traceability, not integrity.
    pub fn content_ident(&self) -> Result<String, GitError> {
        let output = self.run(vec!["status".to_string(), "-v".to_string()])?;
        let digest = Sha256::digest(output.stdout.as_bytes());
        let mut hex = String::with_capacity(CONTENT_IDENT_LEN);
        for byte in digest.iter().take(CONTENT_IDENT_LEN / 2) {
            hex.push_str(&format!("{byte:02x}"));
        }
        Ok(hex)
    }

    fn run(&self, args: Vec<String>) -> Result<GitOutput, GitError> {
        let command = format!("git {}", args.join(" "));
        let result = self.executor.execute("git", &args, &self.repo_path).map_err(|error| {
            GitError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };

        Err(GitError::CommandFailed { command, code: result.code, stderr })
    }
}

/// Extract repo-relative paths from `git status --porcelain` output.
///
/// Lines look like `XY path`, with quoting for unusual names and
/// `old -> new` for renames; only the current path matters here.
fn parse_porcelain(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let path = line.get(3..)?.trim();
            if path.is_empty() {
                return None;
            }
            let path = match path.rsplit_once(" -> ") {
                Some((_, renamed_to)) => renamed_to,
                None => path,
            };
            Some(path.trim_matches('"').to_string())
        })
        .collect()
}

/// Parse `git log --oneline` output into records, reordered oldest first
/// (git emits newest first).
fn parse_oneline_log(stdout: &str) -> Vec<CommitRecord> {
    let mut records: Vec<CommitRecord> = stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match line.split_once(' ') {
                Some((hash, summary)) => Some(CommitRecord {
                    short_hash: hash.to_string(),
                    summary: summary.trim().to_string(),
                }),
                None => {
                    Some(CommitRecord { short_hash: line.to_string(), summary: String::new() })
                }
            }
        })
        .collect();
    records.reverse();
    records
}
