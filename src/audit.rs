//! # Per-role audit log.
//!
//! Every worker writes human-readable lines to its own file under the log
//! directory (`telemetry.log`, `display.log`, ...), each prefixed with a local
//! timestamp:
//!
//! ```text
//! [2024-05-02 14:03:11.417] Key Press: f, Force Direction: [1, 0]
//! ```
//!
//! The supervisor's file is appended across runs; the others start empty. Write
//! failures after the file is open are reported through `tracing` and otherwise
//! ignored: a broken audit trail never takes the worker down.

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::WorkerError;
use crate::topology::Role;

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";

enum Sink {
    File(Mutex<File>),
    Memory(StdMutex<Vec<String>>),
    Discard,
}

/// Timestamped text sink for one role.
#[derive(Clone)]
pub struct AuditLog {
    role: Role,
    sink: Arc<Sink>,
}

impl AuditLog {
    /// Opens `<dir>/<role>.log`, or a discarding log when `dir` is `None`.
    pub async fn open(dir: Option<&Path>, role: Role) -> Result<Self, WorkerError> {
        let Some(dir) = dir else {
            return Ok(Self::discard(role));
        };
        fs::create_dir_all(dir)
            .await
            .map_err(|e| WorkerError::setup(format!("log dir {}: {e}", dir.display())))?;

        let path = dir.join(role.log_file());
        let mut opts = OpenOptions::new();
        opts.create(true);
        if role.appends_audit() {
            opts.append(true);
        } else {
            opts.write(true).truncate(true);
        }
        let file = opts
            .open(&path)
            .await
            .map_err(|e| WorkerError::setup(format!("open {}: {e}", path.display())))?;

        Ok(Self {
            role,
            sink: Arc::new(Sink::File(Mutex::new(file))),
        })
    }

    /// In-memory log, inspected with [`AuditLog::lines`].
    pub fn memory(role: Role) -> Self {
        Self {
            role,
            sink: Arc::new(Sink::Memory(StdMutex::new(Vec::new()))),
        }
    }

    pub fn discard(role: Role) -> Self {
        Self {
            role,
            sink: Arc::new(Sink::Discard),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Appends one timestamped line.
    pub async fn record(&self, line: impl AsRef<str>) {
        let stamped = format!(
            "[{}] {}",
            chrono::Local::now().format(TIMESTAMP),
            line.as_ref()
        );
        match self.sink.as_ref() {
            Sink::File(file) => {
                let mut file = file.lock().await;
                let written = async {
                    file.write_all(stamped.as_bytes()).await?;
                    file.write_all(b"\n").await?;
                    file.flush().await
                }
                .await;
                if let Err(e) = written {
                    tracing::warn!(role = self.role.as_str(), error = %e, "audit write failed");
                }
            }
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(stamped);
                }
            }
            Sink::Discard => {}
        }
    }

    /// Recorded lines with their timestamps; empty unless built with [`AuditLog::memory`].
    pub fn lines(&self) -> Vec<String> {
        match self.sink.as_ref() {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}
