// Shared sync state, message-passing style.
//
// Pull, push and commit all flow through one request channel consumed by a
// single engine task, so at most one of them is ever in flight. The engine
// publishes the operation it is currently running on a watch channel;
// `None` means the repository is quiescent.

use tokio::sync::{mpsc, oneshot, watch};

/// The three operations an actor can ask the engine to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Pull,
    Push,
    Commit,
}

impl SyncOp {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOp::Pull => "pull",
            SyncOp::Push => "push",
            SyncOp::Commit => "commit",
        }
    }
}

/// Where a request came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Fired once during startup, outside any timer gate.
    Startup,
    /// Fired by a periodic trigger loop.
    Schedule,
    /// Entered by the operator at the console.
    Console,
}

impl RequestOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            RequestOrigin::Startup => "startup",
            RequestOrigin::Schedule => "schedule",
            RequestOrigin::Console => "console",
        }
    }
}

/// What a pass did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The operation ran to completion.
    Completed,
    /// There was nothing to do this cycle.
    Skipped,
    /// A git call failed; logged, retried on a later cycle.
    Failed,
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Completed => "completed",
            SyncOutcome::Skipped => "nothing to do",
            SyncOutcome::Failed => "failed, see log",
        }
    }
}

/// A unit of work for the engine. `done` is signalled when the pass
/// finishes, letting the requester block until its turn has been served.
#[derive(Debug)]
pub struct SyncRequest {
    pub op: SyncOp,
    pub origin: RequestOrigin,
    pub done: Option<oneshot::Sender<SyncOutcome>>,
}

/// Sending half of the engine's request channel.
pub type RequestSender = mpsc::UnboundedSender<SyncRequest>;
/// Receiving half of the engine's request channel.
pub type RequestReceiver = mpsc::UnboundedReceiver<SyncRequest>;
/// Observer for the operation currently in flight.
pub type ActiveOpReceiver = watch::Receiver<Option<SyncOp>>;

pub fn request_channel() -> (RequestSender, RequestReceiver) {
    mpsc::unbounded_channel()
}

/// Submit one request and wait for the engine to serve it.
///
/// Returns `None` when the engine is gone (shutdown or fatal failure);
/// callers should wind down rather than retry.
pub async fn request(
    requests: &RequestSender,
    op: SyncOp,
    origin: RequestOrigin,
) -> Option<SyncOutcome> {
    let (done_tx, done_rx) = oneshot::channel();
    let submission = SyncRequest { op, origin, done: Some(done_tx) };
    if requests.send(submission).is_err() {
        return None;
    }
    done_rx.await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(SyncOp::Pull.label(), "pull");
        assert_eq!(SyncOp::Push.label(), "push");
        assert_eq!(SyncOp::Commit.label(), "commit");
        assert_eq!(RequestOrigin::Console.label(), "console");
        assert_eq!(SyncOutcome::Skipped.label(), "nothing to do");
    }

    #[tokio::test]
    async fn request_resolves_when_engine_acks() {
        let (tx, mut rx) = request_channel();

        let serve = tokio::spawn(async move {
            let received = rx.recv().await.expect("request should arrive");
            assert_eq!(received.op, SyncOp::Push);
            assert_eq!(received.origin, RequestOrigin::Console);
            if let Some(done) = received.done {
                done.send(SyncOutcome::Completed).expect("ack should be received");
            }
        });

        let outcome = request(&tx, SyncOp::Push, RequestOrigin::Console).await;
        assert_eq!(outcome, Some(SyncOutcome::Completed));
        serve.await.expect("serve task should finish");
    }

    #[tokio::test]
    async fn request_returns_none_when_engine_gone() {
        let (tx, rx) = request_channel();
        drop(rx);

        let outcome = request(&tx, SyncOp::Pull, RequestOrigin::Schedule).await;
        assert_eq!(outcome, None);
    }
}
