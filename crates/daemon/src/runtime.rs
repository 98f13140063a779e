// Orchestration: startup ordering, shutdown propagation, orderly join.
//
// Startup follows a fixed sequence: the pull loop (which reconciles once
// immediately), a short settle delay, the push loop, one synchronous
// commit pass, the console, and finally the commit ticker on the calling
// task. Shutdown is the reverse: flip the watch flag, let every loop
// observe it at its next cycle, drop the request channel so the engine
// drains and exits, then join everything.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::info;

use crate::config::SyncConfig;
use crate::console;
use crate::display::DisplayHandle;
use crate::git::repo::{CommandExecutor, GitRepo};
use crate::sync::engine::SyncEngine;
use crate::sync::loops;
use crate::sync::state::{self, RequestOrigin, SyncOp};

/// Pause between starting the pull loop and the push loop, so the initial
/// reconcile settles before any push activity.
const STARTLE_DELAY: Duration = Duration::from_secs(5);

/// Run the agent against a real repository until interrupted.
pub async fn run(config: SyncConfig, repo_root: PathBuf, display: DisplayHandle) -> Result<()> {
    let repo = GitRepo::new(repo_root);
    let (shutdown_tx, _shutdown_rx) = watch::channel(false);

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, shutting down");
        let _ = ctrl_c_tx.send(true);
    });

    let input = console::spawn_stdin_reader();
    run_with(config, repo, display, input, shutdown_tx).await
}

/// Orchestrate with every external edge injectable: the executor behind
/// `repo`, the operator input stream, and the shutdown trigger.
pub async fn run_with<E>(
    config: SyncConfig,
    repo: GitRepo<E>,
    display: DisplayHandle,
    input: mpsc::UnboundedReceiver<String>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()>
where
    E: CommandExecutor + Clone + Send + Sync + 'static,
{
    let (requests_tx, requests_rx) = state::request_channel();
    let (engine, _active_rx) = SyncEngine::new(repo, &config.remote, &config.branch);
    let engine_task = tokio::spawn(engine.run(requests_rx));

    // the pull loop fires its first reconcile immediately
    let pull_task = tokio::spawn(loops::run_pull_loop(
        requests_tx.clone(),
        config.sync_interval(),
        shutdown_tx.subscribe(),
    ));

    sleep(STARTLE_DELAY).await;

    let push_task = tokio::spawn(loops::run_push_loop(
        requests_tx.clone(),
        config.sync_interval(),
        shutdown_tx.subscribe(),
    ));

    // one commit pass before the console comes up
    let _ = state::request(&requests_tx, SyncOp::Commit, RequestOrigin::Startup).await;

    let console_task = tokio::spawn(console::run_console(
        requests_tx.clone(),
        display,
        input,
        config.prompt_timeout(),
        shutdown_tx.subscribe(),
    ));

    // the orchestrator's own loop; returns on shutdown or engine loss
    loops::run_commit_loop(requests_tx.clone(), config.commit_interval(), shutdown_tx.subscribe())
        .await;

    // make sure every worker sees the flag even if we got here because
    // the engine died rather than because an interrupt was requested
    let _ = shutdown_tx.send(true);

    let (pull, push, console) = tokio::join!(pull_task, push_task, console_task);
    drop(requests_tx);
    let engine = engine_task.await;

    for (name, joined) in [
        ("pull loop", pull),
        ("push loop", push),
        ("console", console),
        ("sync engine", engine),
    ] {
        joined.with_context(|| format!("{name} task failed"))?;
    }

    info!("all sync workers stopped");
    Ok(())
}
