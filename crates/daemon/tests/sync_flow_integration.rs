// End-to-end orchestration tests against a fake git.
//
// The fake executor maintains a tiny model of a repository (dirty files,
// local-only commits, pending remote commits, one stash slot) and answers
// the same commands the real CLI would. Time is paused, so whole sync
// windows elapse instantly and deterministically.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use reposync_daemon::config::SyncConfig;
use reposync_daemon::display;
use reposync_daemon::git::repo::{CommandExecutor, CommandResult, GitRepo};
use reposync_daemon::runtime;

#[derive(Default)]
struct FakeRepo {
    /// Paths with uncommitted changes.
    dirty: Vec<String>,
    /// Local-only commits, newest first, as `<hash> <subject>` lines.
    local_commits: Vec<String>,
    /// Remote commits the local branch lacks, newest first.
    remote_pending: Vec<String>,
    /// The most recent stash entry's shelved paths.
    stash: Vec<String>,
    /// Commits that reached the remote, in push order.
    pushed: Vec<String>,
    commit_counter: u32,
}

#[derive(Clone)]
struct FakeGit {
    state: Arc<Mutex<FakeRepo>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeGit {
    fn new(state: FakeRepo) -> Self {
        Self { state: Arc::new(Mutex::new(state)), log: Arc::new(Mutex::new(Vec::new())) }
    }

    fn command_lines(&self) -> Vec<String> {
        self.log.lock().expect("log lock poisoned").clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeRepo> {
        self.state.lock().expect("state lock poisoned")
    }

    fn ok(stdout: String) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult { success: true, code: Some(0), stdout, stderr: String::new() })
    }
}

impl CommandExecutor for FakeGit {
    fn execute(
        &self,
        _program: &str,
        args: &[String],
        _cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let line = args.join(" ");
        self.log.lock().expect("log lock poisoned").push(line.clone());

        let mut repo = self.state.lock().expect("state lock poisoned");
        let first = args.first().map(String::as_str).unwrap_or_default();

        let stdout = match first {
            "fetch" => String::new(),
            "log" => {
                if args[1].starts_with("HEAD..") {
                    repo.remote_pending.join("\n")
                } else {
                    repo.local_commits.join("\n")
                }
            }
            "status" if args[1] == "--porcelain" => {
                repo.dirty.iter().map(|p| format!(" M {p}\n")).collect()
            }
            "status" => {
                // verbose status: any deterministic digest input will do
                format!("dirty={:?} local={:?}", repo.dirty, repo.local_commits)
            }
            "add" => String::new(),
            "commit" => {
                repo.commit_counter += 1;
                let hash = format!("c{:06x}", repo.commit_counter);
                let subject = args[2].clone();
                repo.local_commits.insert(0, format!("{hash} {subject}"));
                repo.dirty.clear();
                format!("[main {hash}] {subject}")
            }
            "reset" => {
                let folded: usize = args[2]
                    .strip_prefix("HEAD~")
                    .and_then(|n| n.parse().ok())
                    .expect("soft reset target should be HEAD~N");
                repo.local_commits.drain(..folded);
                String::new()
            }
            "push" => {
                let published: Vec<String> = repo.local_commits.drain(..).collect();
                repo.pushed.extend(published);
                String::new()
            }
            "pull" => {
                repo.remote_pending.clear();
                "Updating working tree".to_string()
            }
            "stash" if args[1] == "push" => {
                repo.stash = repo.dirty.drain(..).collect();
                String::new()
            }
            "stash" => {
                let restored = repo.stash.clone();
                repo.dirty.extend(restored);
                String::new()
            }
            other => panic!("fake git got unexpected command: {other} ({line})"),
        };

        Self::ok(stdout)
    }
}

struct Harness {
    git: FakeGit,
    input_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

fn start(config: SyncConfig, initial: FakeRepo) -> Harness {
    let git = FakeGit::new(initial);
    let repo = GitRepo::with_executor("/fake/repo", git.clone());
    let (display_handle, _display_rx) = display::channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, _shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(runtime::run_with(
        config,
        repo,
        display_handle,
        input_rx,
        shutdown_tx.clone(),
    ));

    Harness { git, input_tx, shutdown_tx, task }
}

async fn settle(virtual_secs: u64) {
    // Under `start_paused`, the runtime auto-advances time only once every
    // task is parked on a timer, so awaiting this sleep drains each loop's
    // scheduled work — including the blocking git hops — before the clock
    // moves on to the next tick.
    tokio::time::sleep(Duration::from_secs(virtual_secs)).await;
}

async fn stop(harness: Harness) -> (FakeGit, Vec<String>) {
    harness.shutdown_tx.send(true).expect("workers should still be listening");
    harness
        .task
        .await
        .expect("orchestrator task should not panic")
        .expect("orchestrator should shut down cleanly");
    let lines = harness.git.command_lines();
    (harness.git, lines)
}

fn index_of(lines: &[String], wanted: &str) -> usize {
    lines
        .iter()
        .position(|line| line.starts_with(wanted))
        .unwrap_or_else(|| panic!("expected `{wanted}` in {lines:?}"))
}

fn test_config() -> SyncConfig {
    SyncConfig {
        remote: "origin".into(),
        branch: "main".into(),
        sync_interval_secs: 30,
        commit_interval_secs: 10,
        prompt_timeout_secs: 5,
    }
}

#[tokio::test(start_paused = true)]
async fn startup_pull_shelves_dirty_files_then_commit_pass_commits_them() {
    let harness = start(
        test_config(),
        FakeRepo {
            dirty: vec!["notes.md".to_string()],
            remote_pending: vec!["f0f0f0f upstream change".to_string()],
            ..FakeRepo::default()
        },
    );

    settle(20).await;
    let (git, lines) = stop(harness).await;

    // startup pull with a dirty tree: shelve, pull, restore, in order
    let stash_push = index_of(&lines, "stash push -u notes.md");
    let pull = index_of(&lines, "pull origin main");
    let stash_apply = index_of(&lines, "stash apply stash@{0}");
    assert!(index_of(&lines, "fetch --all") < pull);
    assert!(stash_push < pull && pull < stash_apply);

    // the startup commit pass then turns the restored edits into a commit
    let add = index_of(&lines, "add notes.md");
    let commit = index_of(&lines, "commit -m sync -- #");
    assert!(stash_apply < add && add < commit);

    // dirty edits survived the pull and ended up committed
    let state = git.state();
    assert!(state.dirty.is_empty());
    assert!(state.remote_pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn accumulated_commits_fold_into_one_before_push() {
    let harness = start(
        test_config(),
        FakeRepo {
            local_commits: vec![
                "c3c3c3c sync -- #ccc".to_string(),
                "b2b2b2b sync -- #bbb".to_string(),
                "a1a1a1a sync -- #aaa".to_string(),
            ],
            ..FakeRepo::default()
        },
    );

    // past the push interval
    settle(60).await;
    let (git, lines) = stop(harness).await;

    let reset = index_of(&lines, "reset --soft HEAD~3");
    let push = index_of(&lines, "push origin main");
    assert!(reset < push);
    assert_eq!(
        lines.iter().filter(|line| line.starts_with("push ")).count(),
        1,
        "one squashed commit means one push"
    );

    let state = git.state();
    assert!(state.local_commits.is_empty(), "local run published");
    assert_eq!(state.pushed.len(), 1, "remote received exactly one commit");
    assert!(state.pushed[0].contains("sync -- #"), "pushed commit carries a content identifier");
}

#[tokio::test(start_paused = true)]
async fn single_local_commit_pushes_without_history_rewrite() {
    let harness = start(
        test_config(),
        FakeRepo { local_commits: vec!["a1a1a1a sync -- #aaa".to_string()], ..FakeRepo::default() },
    );

    settle(60).await;
    let (git, lines) = stop(harness).await;

    assert!(lines.iter().all(|line| !line.starts_with("reset")), "no squash for one commit");
    index_of(&lines, "push origin main");
    assert_eq!(git.state().pushed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn console_push_ignores_the_push_timer() {
    let mut config = test_config();
    config.sync_interval_secs = 100_000; // the scheduled push can never fire

    let harness = start(
        config,
        FakeRepo { local_commits: vec!["a1a1a1a sync -- #aaa".to_string()], ..FakeRepo::default() },
    );

    // past startup, nowhere near the push interval
    settle(10).await;
    harness.input_tx.send("1".to_string()).expect("console should be listening");
    settle(10).await;

    let (git, lines) = stop(harness).await;

    index_of(&lines, "push origin main");
    assert_eq!(git.state().pushed.len(), 1, "operator push must not wait out the timer");
}

#[tokio::test(start_paused = true)]
async fn quiescent_repository_never_commits_or_pushes() {
    let harness = start(test_config(), FakeRepo::default());

    settle(120).await;
    let (_git, lines) = stop(harness).await;

    assert!(lines.iter().all(|line| !line.starts_with("commit")), "clean tree: no commits");
    assert!(lines.iter().all(|line| !line.starts_with("push")), "nothing local: no pushes");
    assert!(lines.iter().all(|line| !line.starts_with("pull ")), "remote quiet: no pulls");
    // but the schedule kept checking
    assert!(lines.iter().filter(|line| line.starts_with("fetch --all")).count() >= 2);
}
