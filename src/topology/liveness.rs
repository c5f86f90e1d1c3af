//! # Probe/ack liveness protocol.
//!
//! The supervisor probes every monitored role once per round over a dedicated
//! channel; a worker answers each probe with an ack carrying its identity. Acks,
//! round ticks and stop requests all reach the supervisor as [`SupervisorEvent`]s
//! and are applied by [`Monitor`] one at a time, so counters are never mutated
//! from two places.
//!
//! ## Round layout
//! ```text
//! tick 1: probe Telemetry   (counter += 1)
//! tick 2: probe Display
//! tick 3: probe InputRouter
//! tick 4: probe Physics
//! tick 5: close round N (check counters > threshold) ─► probe Telemetry of round N+1
//! ...
//! AckReceived(id) at any point ─► counter(role of id) = 0
//! ```
//!
//! ## Rules
//! - A counter only grows by one per round.
//! - Termination fires once: on the first round close where any counter exceeds
//!   the threshold, listing every role over it, or on the first external stop.
//! - After termination every further event is ignored.

use std::fmt::Write as _;

use tokio::sync::mpsc;

use crate::error::WorkerError;
use crate::topology::{HandshakeSender, Role, WorkerId};

/// Capacity of each per-role probe channel.
const PROBE_QUEUE: usize = 8;

/// Liveness probe sent to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Supervision round the probe belongs to.
    pub round: u64,
}

/// Inputs of the supervisor's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Time to probe the next role (or to close the round).
    RoundTick,
    /// A worker answered a probe.
    AckReceived(WorkerId),
    /// Operator-initiated global stop.
    ExternalStop,
}

/// Creates the supervisor's event queue.
///
/// Returns the ack sender shared by all monitored workers, the stop handle for the
/// orchestrator, and the receiving end consumed by the supervisor.
pub fn supervisor_queue(
    capacity: usize,
) -> (AckSender, SupervisorControl, mpsc::Receiver<SupervisorEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        AckSender { tx: tx.clone() },
        SupervisorControl { tx },
        rx,
    )
}

/// Creates the probe channel for one monitored role.
pub fn probe_channel(role: Role, acks: AckSender) -> (ProbeSender, LivenessEndpoint) {
    let (tx, rx) = mpsc::channel(PROBE_QUEUE);
    (
        ProbeSender { role, tx },
        LivenessEndpoint { probes: rx, acks },
    )
}

/// Supervisor side of one role's probe channel.
#[derive(Debug, Clone)]
pub struct ProbeSender {
    role: Role,
    tx: mpsc::Sender<Probe>,
}

impl ProbeSender {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Delivers a probe without waiting.
    ///
    /// A full queue means the worker is not draining probes; the probe is dropped
    /// and the miss shows up in the counter. A closed queue means the worker is gone.
    pub fn send(&self, probe: Probe) -> Result<(), WorkerError> {
        match self.tx.try_send(probe) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(WorkerError::communication(
                format!("probe channel to {} closed", self.role),
            )),
        }
    }
}

/// Worker side handle for answering probes.
#[derive(Debug, Clone)]
pub struct AckSender {
    tx: mpsc::Sender<SupervisorEvent>,
}

impl AckSender {
    /// Queues an ack for `from`; returns false if it could not be queued.
    pub fn acknowledge(&self, from: WorkerId) -> bool {
        self.tx
            .try_send(SupervisorEvent::AckReceived(from))
            .is_ok()
    }
}

/// Orchestrator's handle for requesting a global stop through the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorControl {
    tx: mpsc::Sender<SupervisorEvent>,
}

impl SupervisorControl {
    /// Requests an external stop; returns false if the supervisor is gone.
    pub async fn request_stop(&self) -> bool {
        self.tx.send(SupervisorEvent::ExternalStop).await.is_ok()
    }
}

/// Worker side of the liveness protocol.
#[derive(Debug)]
pub struct LivenessEndpoint {
    probes: mpsc::Receiver<Probe>,
    acks: AckSender,
}

impl LivenessEndpoint {
    /// Waits for the next probe; `None` once the supervisor is gone.
    pub async fn next_probe(&mut self) -> Option<Probe> {
        self.probes.recv().await
    }

    /// Answers a probe.
    pub fn acknowledge(&self, from: WorkerId) -> bool {
        self.acks.acknowledge(from)
    }
}

/// Endpoints every monitored worker holds toward the supervisor.
#[derive(Debug)]
pub struct MonitorEndpoints {
    pub handshake: HandshakeSender,
    pub liveness: LivenessEndpoint,
}

#[derive(Debug, Clone)]
struct Entry {
    role: Role,
    worker: WorkerId,
    misses: u32,
}

/// Per-role miss counters.
#[derive(Debug, Clone)]
pub struct LivenessTable {
    threshold: u32,
    entries: Vec<Entry>,
}

impl LivenessTable {
    /// Builds a table; `members` order is the probe order.
    pub fn new(threshold: u32, members: impl IntoIterator<Item = (Role, WorkerId)>) -> Self {
        Self {
            threshold,
            entries: members
                .into_iter()
                .map(|(role, worker)| Entry {
                    role,
                    worker,
                    misses: 0,
                })
                .collect(),
        }
    }

    /// Counts a probe against `role`; returns the new counter.
    pub fn record_probe(&mut self, role: Role) -> Option<u32> {
        let entry = self.entries.iter_mut().find(|e| e.role == role)?;
        entry.misses += 1;
        Some(entry.misses)
    }

    /// Resets the counter of whichever role `from` belongs to.
    pub fn acknowledge(&mut self, from: WorkerId) -> Option<Role> {
        let entry = self.entries.iter_mut().find(|e| e.worker == from)?;
        entry.misses = 0;
        Some(entry.role)
    }

    pub fn counter(&self, role: Role) -> Option<u32> {
        self.entries.iter().find(|e| e.role == role).map(|e| e.misses)
    }

    /// Roles whose counter is strictly above the threshold.
    pub fn exceeded(&self) -> Vec<Role> {
        self.entries
            .iter()
            .filter(|e| e.misses > self.threshold)
            .map(|e| e.role)
            .collect()
    }

    /// `(role, counter)` pairs in probe order.
    pub fn counters(&self) -> Vec<(Role, u32)> {
        self.entries.iter().map(|e| (e.role, e.misses)).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn member(&self, idx: usize) -> (Role, WorkerId) {
        let e = &self.entries[idx];
        (e.role, e.worker)
    }
}

/// Renders counters as `Telemetry(1) Display(0) ...`.
pub fn render_counters(counters: &[(Role, u32)]) -> String {
    let mut out = String::new();
    for (i, (role, n)) in counters.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{role}({n})");
    }
    out
}

/// Why the supervisor tore the topology down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCause {
    /// Counters over the threshold at the close of `round`.
    LivenessExceeded { round: u64, roles: Vec<Role> },
    /// Operator-initiated stop.
    ExternalStop,
}

impl TerminationCause {
    /// The error the supervisor exits with.
    pub fn into_error(self) -> WorkerError {
        match self {
            TerminationCause::LivenessExceeded { roles, .. } => {
                WorkerError::LivenessFailure { roles }
            }
            TerminationCause::ExternalStop => WorkerError::ExternalStop,
        }
    }
}

/// What the supervisor loop must do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorAction {
    /// Send a probe to `worker`.
    Probe {
        role: Role,
        worker: WorkerId,
        round: u64,
    },
    /// A round closed with these counters.
    RoundCompleted {
        round: u64,
        counters: Vec<(Role, u32)>,
    },
    /// An ack reset `role`'s counter.
    Acknowledged { role: Role, worker: WorkerId },
    /// Tear the topology down.
    Terminate(TerminationCause),
}

/// Monitoring-phase state machine of the supervisor.
#[derive(Debug, Clone)]
pub struct Monitor {
    table: LivenessTable,
    cursor: usize,
    round: u64,
    terminating: bool,
}

impl Monitor {
    pub fn new(table: LivenessTable) -> Self {
        Self {
            table,
            cursor: 0,
            round: 1,
            terminating: false,
        }
    }

    /// Applies one event and returns the resulting actions, in order.
    pub fn handle(&mut self, event: SupervisorEvent) -> Vec<MonitorAction> {
        if self.terminating {
            return Vec::new();
        }
        match event {
            SupervisorEvent::RoundTick => self.on_tick(),
            SupervisorEvent::AckReceived(from) => match self.table.acknowledge(from) {
                Some(role) => vec![MonitorAction::Acknowledged { role, worker: from }],
                None => Vec::new(),
            },
            SupervisorEvent::ExternalStop => {
                self.terminating = true;
                vec![MonitorAction::Terminate(TerminationCause::ExternalStop)]
            }
        }
    }

    fn on_tick(&mut self) -> Vec<MonitorAction> {
        if self.table.len() == 0 {
            return Vec::new();
        }
        let mut actions = Vec::with_capacity(2);

        if self.cursor == self.table.len() {
            actions.push(MonitorAction::RoundCompleted {
                round: self.round,
                counters: self.table.counters(),
            });
            let dead = self.table.exceeded();
            if !dead.is_empty() {
                self.terminating = true;
                actions.push(MonitorAction::Terminate(
                    TerminationCause::LivenessExceeded {
                        round: self.round,
                        roles: dead,
                    },
                ));
                return actions;
            }
            self.cursor = 0;
            self.round += 1;
        }

        let (role, worker) = self.table.member(self.cursor);
        self.table.record_probe(role);
        self.cursor += 1;
        actions.push(MonitorAction::Probe {
            role,
            worker,
            round: self.round,
        });
        actions
    }
}
