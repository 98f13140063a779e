// Interactive console: the operator's on-demand trigger for push, pull
// and commit.
//
// Two states: Idle (background log lines own the display) and Prompting
// (the console owns it). A prompt waits a bounded time for one line of
// input; on timeout it yields the display back silently. Commands are
// dispatched through the same engine channel as the scheduled loops, so a
// console-triggered push can never coincide with a background pull.

use std::io::BufRead;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::display::DisplayHandle;
use crate::sync::state::{request, RequestOrigin, RequestSender, SyncOp};

pub const PROMPT: &str = "1[push] 2[pull] 3[commit] >> ";
const UNKNOWN_COMMAND: &str = "unknown command, check input";

/// Map one line of operator input to an operation.
pub fn parse_command(input: &str) -> Option<SyncOp> {
    match input.trim() {
        "1" => Some(SyncOp::Push),
        "2" => Some(SyncOp::Pull),
        "3" => Some(SyncOp::Commit),
        _ => None,
    }
}

/// Feed stdin lines into a channel from a dedicated thread. A blocked
/// terminal read cannot observe cancellation, so the thread is detached
/// and dies with the process.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new().name("stdin-reader".to_string()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    if let Err(error) = spawned {
        warn!(%error, "failed to start stdin reader; console input disabled");
    }
    rx
}

/// Run the console until shutdown, the input stream closes, or the
/// engine goes away.
pub async fn run_console(
    requests: RequestSender,
    display: DisplayHandle,
    mut input: mpsc::UnboundedReceiver<String>,
    prompt_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        display.show_prompt(PROMPT);

        let line = tokio::select! {
            line = timeout(prompt_timeout, input.recv()) => line,
            changed = shutdown.changed() => {
                display.hide_prompt();
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        match line {
            // operator walked away; yield the display back to the log
            Err(_elapsed) => display.hide_prompt(),
            // stdin closed: nothing further can ever arrive
            Ok(None) => {
                display.hide_prompt();
                break;
            }
            Ok(Some(text)) => {
                display.hide_prompt();
                if !handle_command(&requests, &display, &text).await {
                    break;
                }
            }
        }
    }
    debug!("console stopped");
}

/// Dispatch one line of input. Returns false when the engine is gone.
async fn handle_command(requests: &RequestSender, display: &DisplayHandle, text: &str) -> bool {
    let Some(op) = parse_command(text) else {
        display.line(UNKNOWN_COMMAND);
        return true;
    };

    match request(requests, op, RequestOrigin::Console).await {
        Some(outcome) => {
            display.line(format!("{}: {}", op.label(), outcome.label()));
            true
        }
        None => false,
    }
}
