// Single-consumer sync engine.
//
// The engine task is the only actor that touches the repository. It drains
// one request at a time from the channel, so a pull can never race a push
// or a commit; the old check-the-other-flags convention is replaced by
// construction. Each git call runs on the blocking pool and cannot be
// interrupted mid-call; cancellation is only observed between requests.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::git::repo::{CommandExecutor, GitError, GitRepo};
use crate::git::squash::{self, SquashOutcome};
use crate::sync::state::{ActiveOpReceiver, RequestOrigin, RequestReceiver, SyncOp, SyncOutcome};

/// The stash slot used to shelve dirty files across a pull. Entries are
/// applied but never dropped; the operator garbage-collects the stash.
const STASH_SLOT: &str = "stash@{0}";

pub struct SyncEngine<E> {
    repo: GitRepo<E>,
    remote: String,
    branch: String,
    active: watch::Sender<Option<SyncOp>>,
}

impl<E> SyncEngine<E>
where
    E: CommandExecutor + Clone + Send + Sync + 'static,
{
    pub fn new(
        repo: GitRepo<E>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> (Self, ActiveOpReceiver) {
        let (active, active_rx) = watch::channel(None);
        (Self { repo, remote: remote.into(), branch: branch.into(), active }, active_rx)
    }

    /// Serve requests until every sender is dropped. Queued requests are
    /// drained before exit, so an in-flight operation always finishes.
    pub async fn run(self, mut requests: RequestReceiver) {
        while let Some(request) = requests.recv().await {
            let outcome = self.execute(request.op, request.origin).await;
            if let Some(done) = request.done {
                let _ = done.send(outcome);
            }
        }
        let _ = self.active.send(None);
        debug!("sync engine stopped");
    }

    async fn execute(&self, op: SyncOp, origin: RequestOrigin) -> SyncOutcome {
        let result = match op {
            SyncOp::Pull => self.pull_pass(origin).await,
            SyncOp::Push => self.push_pass(origin).await,
            SyncOp::Commit => self.commit_pass(origin).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                // never fatal: log, clear the active marker, serve the
                // next request; the trigger loops retry on their cadence
                warn!(op = op.label(), origin = origin.label(), %error, "sync operation failed");
                let _ = self.active.send(None);
                SyncOutcome::Failed
            }
        }
    }

    /// Bring the local branch up to date with the remote, shelving and
    /// restoring any uncommitted edits around the pull.
    async fn pull_pass(&self, origin: RequestOrigin) -> Result<SyncOutcome, GitError> {
        self.git(|repo| repo.fetch_all()).await?;

        let (remote, branch) = (self.remote.clone(), self.branch.clone());
        let ahead = self.git(move |repo| repo.remote_ahead(&remote, &branch)).await?;
        if !ahead {
            return Ok(SyncOutcome::Skipped);
        }

        let _ = self.active.send(Some(SyncOp::Pull));
        info!(
            origin = origin.label(),
            remote = %self.remote,
            branch = %self.branch,
            "pulling from remote"
        );

        let dirty = self.git(|repo| repo.dirty_files()).await?;
        let restore_owed = !dirty.is_empty();
        if restore_owed {
            info!(files = dirty.len(), "working tree dirty, shelving under {STASH_SLOT}");
            self.git(move |repo| repo.stash_push(&dirty)).await?;
        }

        let (remote, branch) = (self.remote.clone(), self.branch.clone());
        self.git(move |repo| repo.pull(&remote, &branch)).await?;

        if restore_owed {
            info!("restoring local changes from {STASH_SLOT}");
            self.git(|repo| repo.stash_apply(STASH_SLOT)).await?;
        }

        let _ = self.active.send(None);
        Ok(SyncOutcome::Completed)
    }

    /// Turn accumulated edits into one sync commit. A clean tree is a
    /// no-op, so back-to-back passes never create empty commits.
    async fn commit_pass(&self, origin: RequestOrigin) -> Result<SyncOutcome, GitError> {
        let dirty = self.git(|repo| repo.dirty_files()).await?;
        if dirty.is_empty() {
            return Ok(SyncOutcome::Skipped);
        }

        let _ = self.active.send(Some(SyncOp::Commit));
        self.git(move |repo| repo.stage(&dirty)).await?;
        let ident = self.git(|repo| repo.content_ident()).await?;
        let message = squash::sync_message(&ident);
        info!(origin = origin.label(), message = %message, "committing local changes");
        self.git(move |repo| repo.commit(&message)).await?;

        let _ = self.active.send(None);
        Ok(SyncOutcome::Completed)
    }

    /// Publish local commits as a single logical change: fold the run of
    /// local-only commits first, then push.
    async fn push_pass(&self, origin: RequestOrigin) -> Result<SyncOutcome, GitError> {
        let (remote, branch) = (self.remote.clone(), self.branch.clone());
        let commits = self.git(move |repo| repo.local_commits(&remote, &branch)).await?;
        if commits.is_empty() {
            return Ok(SyncOutcome::Skipped);
        }

        let folded = self.git(move |repo| squash::squash_commits(repo, &commits)).await?;
        if let SquashOutcome::Squashed { collapsed, ident } = &folded {
            debug!(collapsed, ident = %ident, "local commits folded before push");
        }

        let _ = self.active.send(Some(SyncOp::Push));
        info!(
            origin = origin.label(),
            remote = %self.remote,
            branch = %self.branch,
            "pushing to remote"
        );
        let (remote, branch) = (self.remote.clone(), self.branch.clone());
        self.git(move |repo| repo.push(&remote, &branch)).await?;

        let _ = self.active.send(None);
        Ok(SyncOutcome::Completed)
    }

    /// Run one git operation on the blocking pool. The repository handle
    /// is cheap to clone; the executor travels with it.
    async fn git<T, F>(&self, op: F) -> Result<T, GitError>
    where
        F: FnOnce(&GitRepo<E>) -> Result<T, GitError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = self.repo.clone();
        match tokio::task::spawn_blocking(move || op(&repo)).await {
            Ok(result) => result,
            Err(join_error) => Err(GitError::SpawnFailed {
                command: "git".to_string(),
                message: format!("blocking task failed: {join_error}"),
            }),
        }
    }
}
