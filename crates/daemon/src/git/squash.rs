// Commit squashing: collapse the run of local-only commits into a single
// synthetic commit before it is published.
//
// The scheduled commit pass can fire many times between pushes, leaving a
// trail of small sync commits. Folding them keeps the remote history at one
// entry per sync window. Zero or one local commit is left untouched.

use tracing::info;

use super::repo::{CommandExecutor, CommitRecord, GitError, GitRepo};

/// Commit message for a synthetic sync commit carrying a content identifier.
pub fn sync_message(ident: &str) -> String {
    format!("sync -- #{ident}")
}

/// What a squash attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashOutcome {
    /// Nothing to fold: zero or one local commit.
    Skipped,
    /// `collapsed` commits were folded into one new commit tagged `ident`.
    Squashed { collapsed: usize, ident: String },
}

/// Fold `commits` (the local-only run on `HEAD`, oldest first) into one
/// commit. A soft reset moves the branch pointer below the run while
/// keeping index and working tree intact, so the recommit loses nothing.
pub fn squash_commits<E: CommandExecutor>(
    repo: &GitRepo<E>,
    commits: &[CommitRecord],
) -> Result<SquashOutcome, GitError> {
    if commits.len() <= 1 {
        return Ok(SquashOutcome::Skipped);
    }

    let hashes: Vec<&str> = commits.iter().map(|record| record.short_hash.as_str()).collect();
    info!(
        commits = %hashes.join(","),
        onto = %format!("HEAD~{}", commits.len()),
        "squashing local commits"
    );

    repo.soft_reset_to(&format!("HEAD~{}", commits.len()))?;
    let ident = repo.content_ident()?;
    repo.commit(&sync_message(&ident))?;

    Ok(SquashOutcome::Squashed { collapsed: commits.len(), ident })
}
