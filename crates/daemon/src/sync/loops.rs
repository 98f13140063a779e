// Timer-gated trigger loops.
//
// Each loop owns its interval Timer, wakes on a short fixed tick, and when
// the timer has elapsed submits one request to the engine and waits for it
// to be served before re-arming. Serialization in the engine replaces the
// old look-at-the-other-loops'-flags gate.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

use crate::sync::state::{request, RequestOrigin, RequestSender, SyncOp};
use crate::sync::timer::Timer;

/// Poll cadence for the pull and push trigger loops.
const SCHEDULE_TICK: Duration = Duration::from_secs(5);
/// Poll cadence for the orchestrator's commit ticker.
const COMMIT_TICK: Duration = Duration::from_secs(10);

/// Keep the local branch current: one reconcile immediately at startup,
/// then one per elapsed interval.
pub async fn run_pull_loop(
    requests: RequestSender,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    if request(&requests, SyncOp::Pull, RequestOrigin::Startup).await.is_none() {
        return;
    }
    trigger_loop(requests, SyncOp::Pull, interval, SCHEDULE_TICK, shutdown).await;
    debug!("pull loop stopped");
}

/// Publish accumulated local commits once per elapsed interval.
pub async fn run_push_loop(
    requests: RequestSender,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    trigger_loop(requests, SyncOp::Push, interval, SCHEDULE_TICK, shutdown).await;
    debug!("push loop stopped");
}

/// The orchestrator's own loop: a commit pass once per elapsed interval.
/// Runs on the caller's task rather than a spawned one.
pub async fn run_commit_loop(
    requests: RequestSender,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    trigger_loop(requests, SyncOp::Commit, interval, COMMIT_TICK, shutdown).await;
    debug!("commit loop stopped");
}

async fn trigger_loop(
    requests: RequestSender,
    op: SyncOp,
    interval: Duration,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = Timer::new(interval);
    while !*shutdown.borrow() {
        if timer.elapsed() {
            if request(&requests, op, RequestOrigin::Schedule).await.is_none() {
                // engine is gone; nothing left to trigger
                break;
            }
            timer.reset();
        }
        tokio::select! {
            _ = sleep(tick) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
