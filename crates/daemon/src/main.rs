// reposyncd: keeps a git working tree continuously reconciled with its
// remote branch.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reposync_daemon::config::SyncConfig;
use reposync_daemon::display;
use reposync_daemon::git::repo::{discover_toplevel, ProcessCommandExecutor};
use reposync_daemon::runtime;

#[derive(Parser)]
#[command(
    name = "reposyncd",
    about = "Background agent that keeps a git working tree in sync with its remote"
)]
struct Cli {
    /// Repository to sync (defaults to the repository containing the
    /// current directory).
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Configuration file (defaults to `<repo>/.reposync/config.toml`).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // the display task must exist before the first log line: all tracing
    // output is routed through it
    let (display, display_rx) = display::channel();
    let display_task = tokio::spawn(display::run_display(display_rx));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(display::DisplayMakeWriter::new(display.clone()))
        .init();

    let repo_root = match cli.repo {
        Some(path) => path,
        None => discover_toplevel(&ProcessCommandExecutor)
            .context("not inside a git repository (pass --repo)")?,
    };
    let config = match cli.config {
        Some(path) => SyncConfig::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SyncConfig::load(&repo_root),
    };

    info!(repo = %repo_root.display(), remote = %config.remote, branch = %config.branch, "initiated sync");
    let result = runtime::run(config, repo_root, display.clone()).await;

    info!("closing sync, goodbye");
    display.shutdown();
    let _ = display_task.await;
    result
}
