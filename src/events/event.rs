//! # Runtime events emitted by the orchestrator, the supervisor and workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Topology events**: worker spawn, handshake, exit, terminate requests
//! - **Liveness events**: completed probe rounds, acknowledgments, threshold hits
//! - **Shutdown events**: operator stop, teardown within/after grace
//! - **Subscriber events**: overflow and panic reports from the fan-out
//!
//! The [`Event`] struct carries optional metadata such as role, worker identity,
//! reason, round number and exit code.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use dronevisor::{Event, EventKind, Role, WorkerId};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_role(Role::Physics)
//!     .with_reason("terminated on request")
//!     .with_exit_code(143);
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.role, Some(Role::Physics));
//! assert_eq!(ev.exit_code, Some(143));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::topology::{Role, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and reason ("full", "closed")
    SubscriberOverflow,

    // === Topology events ===
    /// A worker was spawned.
    ///
    /// Sets:
    /// - `role`, `worker`
    /// - `reason`: the worker's wiring layout
    WorkerSpawned,

    /// The supervisor received a worker's identity.
    ///
    /// Sets:
    /// - `role`, `worker`
    HandshakeReceived,

    /// A worker's run finished (any cause).
    ///
    /// Sets:
    /// - `role`, `worker`
    /// - `exit_code`
    /// - `reason`: error message (absent on a clean exit)
    WorkerExited,

    /// A terminate request was delivered to a worker (at most once per worker).
    ///
    /// Sets:
    /// - `role`, `worker`
    TerminateSent,

    // === Liveness events ===
    /// The supervisor completed one probe round.
    ///
    /// Sets:
    /// - `round`
    /// - `reason`: rendered counters
    ProbeRoundCompleted,

    /// An acknowledgment reset a role's counter.
    ///
    /// Sets:
    /// - `role`, `worker`
    AckReceived,

    /// At least one counter exceeded the threshold.
    ///
    /// Sets:
    /// - `round`
    /// - `reason`: dead roles
    LivenessExceeded,

    // === Shutdown events ===
    /// OS termination signal observed by the orchestrator.
    ShutdownRequested,

    /// The supervisor sent its terminate fan-out.
    ///
    /// Sets:
    /// - `reason`: termination cause
    TopologyTerminated,

    /// All remaining workers exited within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; stragglers were aborted.
    ///
    /// Sets:
    /// - `reason`: stuck roles
    GraceExceeded,

    // === State events ===
    /// Physics wrote a new window to the store.
    ///
    /// Sets:
    /// - `role`: Physics
    /// - `reason`: rendered previous/updated positions
    PositionUpdated,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Role concerned, if any.
    pub role: Option<Role>,
    /// Worker identity concerned, if any.
    pub worker: Option<WorkerId>,
    /// Human-readable reason (errors, counters, positions).
    pub reason: Option<Arc<str>>,
    /// Supervision round (starting from 1).
    pub round: Option<u64>,
    /// Worker exit code.
    pub exit_code: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            role: None,
            worker: None,
            reason: None,
            round: None,
            exit_code: None,
        }
    }

    /// Attaches a role.
    #[inline]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Attaches a worker identity.
    #[inline]
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a round number.
    #[inline]
    pub fn with_round(mut self, round: u64) -> Self {
        self.round = Some(round);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::WorkerSpawned);
        let b = Event::new(EventKind::WorkerSpawned);
        assert!(b.seq > a.seq);
    }
}
