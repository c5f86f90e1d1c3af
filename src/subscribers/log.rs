//! # LogWriter: event renderer over `tracing`
//!
//! A subscriber that turns runtime [`Event`]s into `tracing` records. Topology
//! changes log at `info`, liveness failures and dropped events at `warn`, per-round
//! chatter (acks, rounds, positions) at `debug`.
//!
//! ## Example output
//! ```text
//! INFO  Launched Physics, id 4 wiring="force<input_router|handshake>supervisor|probe<supervisor|ack>supervisor"
//! INFO  [handshake] role=Physics id=4
//! DEBUG [round] round=3 counters="Telemetry(1) Display(1) InputRouter(1) Physics(1)"
//! WARN  [liveness-exceeded] round=6 dead="[Physics]"
//! INFO  [terminate-sent] role=Display id=2
//! INFO  [exited] role=InputRouter id=3 code=0
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let role = e.role.map(|r| r.as_str()).unwrap_or("-");
        let id = e.worker.map(|w| w.get()).unwrap_or(0);
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::WorkerSpawned => match e.role {
                Some(r) => info!(wiring = reason, "Launched {r}, id {id}"),
                None => info!(id, wiring = reason, "[spawned]"),
            },
            EventKind::HandshakeReceived => {
                info!(role, id, "[handshake]");
            }
            EventKind::WorkerExited => match e.exit_code {
                Some(0) => info!(role, id, code = 0, "[exited]"),
                code => warn!(role, id, code = code.unwrap_or(-1), err = reason, "[exited]"),
            },
            EventKind::TerminateSent => {
                info!(role, id, "[terminate-sent]");
            }
            EventKind::ProbeRoundCompleted => {
                debug!(round = e.round.unwrap_or(0), counters = reason, "[round]");
            }
            EventKind::AckReceived => {
                debug!(role, id, "[ack]");
            }
            EventKind::LivenessExceeded => {
                warn!(round = e.round.unwrap_or(0), dead = reason, "[liveness-exceeded]");
            }
            EventKind::ShutdownRequested => {
                info!(signal = reason, "[shutdown-requested]");
            }
            EventKind::TopologyTerminated => {
                warn!(cause = reason, "[topology-terminated]");
            }
            EventKind::AllStoppedWithin => {
                info!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                warn!(stuck = reason, "[grace-exceeded]");
            }
            EventKind::PositionUpdated => {
                debug!(position = reason, "[position]");
            }
            EventKind::SubscriberOverflow => {
                warn!(info = reason, "[subscriber-overflow]");
            }
            EventKind::SubscriberPanicked => {
                warn!(info = reason, "[subscriber-panicked]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
