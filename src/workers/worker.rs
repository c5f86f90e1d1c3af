//! # Worker abstraction.
//!
//! A [`Worker`] is one role of the topology. The orchestrator builds it from the
//! role's wiring, takes its monitor endpoints (handshake + liveness) and runs it
//! to completion inside its own task with a [`WorkerContext`].
//!
//! ```text
//! runner:  take_monitor() ─► handshake.report(id) ─► AuditLog::open ─► run(ctx)
//!
//! run(ctx) loop:
//!   select! {
//!     ctx.token.cancelled()  → Err(Terminated)
//!     ctx.next_probe()       → ctx.acknowledge(probe)
//!     role-specific input    → ...
//!   }
//! ```
//!
//! [`WorkerContext::pause`] is the sleep every monitored loop uses: it keeps
//! answering probes while it waits, so a worker is never declared dead for sleeping.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditLog;
use crate::error::WorkerError;
use crate::events::Bus;
use crate::topology::{LivenessEndpoint, MonitorEndpoints, Probe, Role, WorkerId};

/// How a worker finished without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The operator pressed the quit key.
    Quit,
}

/// One role of the topology.
#[async_trait]
pub trait Worker: Send {
    fn role(&self) -> Role;

    /// Hands the handshake and liveness endpoints to the runner (monitored roles only).
    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        None
    }

    /// Runs until quit, failure or cancellation.
    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError>;
}

/// Per-worker runtime handles.
pub struct WorkerContext {
    /// Identity reported in the handshake and carried by every ack.
    pub id: WorkerId,
    pub role: Role,
    /// Cancelled by a terminate request.
    pub token: CancellationToken,
    pub bus: Bus,
    pub audit: AuditLog,
    liveness: Option<LivenessEndpoint>,
}

impl WorkerContext {
    pub fn new(
        id: WorkerId,
        role: Role,
        token: CancellationToken,
        bus: Bus,
        audit: AuditLog,
        liveness: Option<LivenessEndpoint>,
    ) -> Self {
        Self {
            id,
            role,
            token,
            bus,
            audit,
            liveness,
        }
    }

    /// Waits for the next probe.
    ///
    /// Never resolves for unmonitored workers or once the supervisor is gone.
    pub async fn next_probe(&mut self) -> Probe {
        loop {
            let Some(endpoint) = self.liveness.as_mut() else {
                return std::future::pending().await;
            };
            if let Some(probe) = endpoint.next_probe().await {
                return probe;
            }
            self.liveness = None;
        }
    }

    /// Answers a probe with this worker's identity.
    pub fn acknowledge(&self, probe: Probe) {
        if let Some(endpoint) = &self.liveness {
            if !endpoint.acknowledge(self.id) {
                tracing::debug!(role = self.role.as_str(), round = probe.round, "ack not queued");
            }
        }
    }

    /// Sleeps for `dur` while answering probes; a terminate request ends it early.
    pub async fn pause(&mut self, dur: Duration) -> Result<(), WorkerError> {
        let token = self.token.clone();
        let sleep = time::sleep(dur);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WorkerError::Terminated),
                _ = &mut sleep => return Ok(()),
                probe = self.next_probe() => self.acknowledge(probe),
            }
        }
    }
}
