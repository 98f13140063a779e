// Display arbitration: one writer task owns the terminal.
//
// Background log lines and the console prompt both arrive here as
// messages, so they can never interleave on screen. While a prompt is
// outstanding, each log line erases it, prints, and redraws it beneath
// the new output. The tracing subscriber is wired in through
// `DisplayMakeWriter`, so every log line in the process takes this path.

use std::io::{self, Write};

use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

/// Carriage return plus ANSI erase-to-end-of-line.
const ERASE_LINE: &str = "\r\x1b[K";

#[derive(Debug)]
pub enum DisplayMessage {
    /// A finished line of output (log or console feedback).
    Line(String),
    /// Take over the display with a prompt; stays until hidden.
    ShowPrompt(String),
    /// Give the display back to the log.
    HidePrompt,
    /// Drain nothing further; the writer task exits.
    Shutdown,
}

/// Cloneable sending side of the display inbox.
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    tx: mpsc::UnboundedSender<DisplayMessage>,
}

impl DisplayHandle {
    pub fn line(&self, line: impl Into<String>) {
        let _ = self.tx.send(DisplayMessage::Line(line.into()));
    }

    pub fn show_prompt(&self, prompt: impl Into<String>) {
        let _ = self.tx.send(DisplayMessage::ShowPrompt(prompt.into()));
    }

    pub fn hide_prompt(&self) {
        let _ = self.tx.send(DisplayMessage::HidePrompt);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(DisplayMessage::Shutdown);
    }
}

pub fn channel() -> (DisplayHandle, mpsc::UnboundedReceiver<DisplayMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DisplayHandle { tx }, rx)
}

/// Serve the display inbox until `Shutdown` or every handle is dropped.
pub async fn run_display(mut rx: mpsc::UnboundedReceiver<DisplayMessage>) {
    let mut screen = Screen::new(io::stdout());
    while let Some(message) = rx.recv().await {
        if matches!(message, DisplayMessage::Shutdown) {
            break;
        }
        if let Err(error) = screen.apply(message) {
            // the display is gone; tracing would loop back into this task
            eprintln!("display writer error: {error}");
            break;
        }
    }
}

/// Terminal state: what is on the current (unterminated) line.
struct Screen<W: Write> {
    out: W,
    prompt: Option<String>,
}

impl<W: Write> Screen<W> {
    fn new(out: W) -> Self {
        Self { out, prompt: None }
    }

    fn apply(&mut self, message: DisplayMessage) -> io::Result<()> {
        match message {
            DisplayMessage::Line(line) => {
                if self.prompt.is_some() {
                    write!(self.out, "{ERASE_LINE}")?;
                }
                writeln!(self.out, "{line}")?;
                if let Some(prompt) = &self.prompt {
                    write!(self.out, "{prompt}")?;
                }
                self.out.flush()
            }
            DisplayMessage::ShowPrompt(prompt) => {
                if self.prompt.is_some() {
                    write!(self.out, "{ERASE_LINE}")?;
                }
                write!(self.out, "{prompt}")?;
                self.prompt = Some(prompt);
                self.out.flush()
            }
            DisplayMessage::HidePrompt => {
                if self.prompt.take().is_some() {
                    write!(self.out, "{ERASE_LINE}")?;
                    self.out.flush()?;
                }
                Ok(())
            }
            DisplayMessage::Shutdown => Ok(()),
        }
    }
}

// ── tracing bridge ──────────────────────────────────────────────────

/// `MakeWriter` that forwards formatted tracing output into the display
/// inbox, one line per message.
#[derive(Debug, Clone)]
pub struct DisplayMakeWriter {
    handle: DisplayHandle,
}

impl DisplayMakeWriter {
    pub fn new(handle: DisplayHandle) -> Self {
        Self { handle }
    }
}

impl<'a> MakeWriter<'a> for DisplayMakeWriter {
    type Writer = LineBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        LineBuffer { handle: self.handle.clone(), buf: Vec::new() }
    }
}

/// Buffers bytes from the subscriber and emits complete lines.
pub struct LineBuffer {
    handle: DisplayHandle,
    buf: Vec<u8>,
}

impl LineBuffer {
    fn drain_complete_lines(&mut self) {
        while let Some(newline_at) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline_at).collect();
            self.emit(&line);
        }
    }

    fn emit(&self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches(['\r', '\n']);
        if !text.is_empty() {
            self.handle.line(text.to_string());
        }
    }
}

impl Write for LineBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_complete_lines();
        Ok(())
    }
}

impl Drop for LineBuffer {
    fn drop(&mut self) {
        self.drain_complete_lines();
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            self.emit(&rest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_all(messages: Vec<DisplayMessage>) -> String {
        let mut screen = Screen::new(Vec::new());
        for message in messages {
            screen.apply(message).expect("writes to a Vec cannot fail");
        }
        String::from_utf8(screen.out).expect("output should be utf-8")
    }

    #[test]
    fn plain_lines_pass_through() {
        let out = apply_all(vec![
            DisplayMessage::Line("first".to_string()),
            DisplayMessage::Line("second".to_string()),
        ]);
        assert_eq!(out, "first\nsecond\n");
    }

    #[test]
    fn log_line_redraws_outstanding_prompt() {
        let out = apply_all(vec![
            DisplayMessage::ShowPrompt(">> ".to_string()),
            DisplayMessage::Line("pulling from remote".to_string()),
        ]);
        assert_eq!(out, ">> \r\x1b[Kpulling from remote\n>> ");
    }

    #[test]
    fn hide_prompt_erases_the_line_once() {
        let out = apply_all(vec![
            DisplayMessage::ShowPrompt(">> ".to_string()),
            DisplayMessage::HidePrompt,
            DisplayMessage::HidePrompt,
        ]);
        assert_eq!(out, ">> \r\x1b[K");
    }

    #[test]
    fn lines_after_hidden_prompt_are_plain() {
        let out = apply_all(vec![
            DisplayMessage::ShowPrompt(">> ".to_string()),
            DisplayMessage::HidePrompt,
            DisplayMessage::Line("pushed".to_string()),
        ]);
        assert_eq!(out, ">> \r\x1b[Kpushed\n");
    }

    #[test]
    fn line_buffer_splits_on_newlines() {
        let (handle, mut rx) = channel();
        let mut writer = LineBuffer { handle, buf: Vec::new() };

        writer.write_all(b"one\ntwo\npartial").expect("buffer write cannot fail");
        writer.flush().expect("flush cannot fail");

        assert!(matches!(rx.try_recv(), Ok(DisplayMessage::Line(line)) if line == "one"));
        assert!(matches!(rx.try_recv(), Ok(DisplayMessage::Line(line)) if line == "two"));
        assert!(rx.try_recv().is_err(), "incomplete line stays buffered");

        drop(writer);
        assert!(matches!(rx.try_recv(), Ok(DisplayMessage::Line(line)) if line == "partial"));
    }

    #[tokio::test]
    async fn run_display_exits_on_shutdown_message() {
        let (handle, rx) = channel();
        let task = tokio::spawn(run_display(rx));
        handle.line("goodbye");
        handle.shutdown();
        task.await.expect("display task should exit cleanly");
    }
}
