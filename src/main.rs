//! Headless drone simulator.
//!
//! Keys are read from stdin, one or more per line (`w e r / s d f / x c v`, `q`
//! to quit). The process exits with the code of the first worker to stop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use dronevisor::{Config, LogWriter, Orchestrator, Subscribe};

#[derive(Parser, Debug)]
#[command(name = "dronevisor", version, about = "Supervised headless drone simulator")]
struct Cli {
    /// Directory receiving one audit log per role.
    #[arg(long, default_value = "log")]
    log_dir: PathBuf,

    /// Do not write audit logs.
    #[arg(long)]
    no_audit: bool,

    /// Teardown grace period in milliseconds.
    #[arg(long, default_value_t = 2000)]
    grace_ms: u64,

    /// Bound on each bootstrap handshake in milliseconds (0 = wait forever).
    #[arg(long, default_value_t = 0)]
    handshake_timeout_ms: u64,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            log_dir: (!self.no_audit).then(|| self.log_dir.clone()),
            grace: Duration::from_millis(self.grace_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            ..Config::default()
        }
    }
}

/// Feeds stdin characters to Display until EOF.
fn spawn_key_reader() -> mpsc::Receiver<char> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            for key in line.chars().filter(|c| !c.is_whitespace()) {
                if tx.send(key).await.is_err() {
                    return;
                }
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let orchestrator = Orchestrator::new(cli.config(), subs);

    let topology = orchestrator.topology(Some(spawn_key_reader()));
    let report = orchestrator
        .run(topology)
        .await
        .context("topology run failed")?;

    tracing::info!(
        role = %report.first.role,
        code = report.exit_code(),
        "first exit triggered teardown"
    );
    let code = report.exit_code();
    orchestrator.shutdown().await;
    std::process::exit(code);
}
