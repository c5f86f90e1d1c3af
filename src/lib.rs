//! # dronevisor
//!
//! **dronevisor** runs a remotely piloted drone simulation as a fixed topology of
//! cooperating workers, supervised for liveness and torn down coherently on the
//! first exit of any worker.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                       ┌──────────────────────────────┐
//!                       │         Orchestrator         │
//!                       │  - Bus (broadcast events)    │
//!                       │  - ProcessTable (terminate)  │
//!                       │  - StoreNamespace            │
//!                       └──────────────┬───────────────┘
//!        spawn (fixed order)           │          await_any_exit → terminate_others
//!   ┌───────────┬───────────┬──────────┴──┬───────────┬──────────────┐
//!   ▼           ▼           ▼             ▼           ▼              │
//! Telemetry   Display   InputRouter    Physics    Supervisor         │
//!   │ create    │ write      │ keys ──►     │ tick     ▲ handshakes   │
//!   │ read      │ read       │ force ──────►│ write    │ probes/acks  │
//!   ▼           ▼            │              ▼          │              │
//! ┌──────────────────────────┴──────────────────────┐  │              │
//! │      PositionStore "/drone_position" (lock)     │  │              │
//! └─────────────────────────────────────────────────┘  │              │
//!   ▲ Probe ─────────── Supervisor ────────────────────┘              │
//!   └─ Ack (any time, including mid-round)                            │
//! ```
//!
//! ### Supervisor lifecycle
//! ```text
//! Bootstrapping ──(4 handshakes)──► Monitoring ──(counter > threshold | ExternalStop)──► Terminating
//!
//! Monitoring, one event loop:
//!   RoundTick        → probe next role (counter += 1) or close the round
//!   AckReceived(id)  → counter(role of id) = 0
//!   ExternalStop     → Terminating
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types                                  |
//! |-------------------|------------------------------------------------------------|--------------------------------------------|
//! | **Orchestration** | Spawn the fixed topology, wait for first exit, tear down.  | [`Orchestrator`], [`WorkerHandle`]         |
//! | **Supervision**   | Probe/ack liveness with per-role miss counters.            | [`Supervisor`], [`Monitor`]                |
//! | **Shared state**  | Named, lock-guarded 3-sample position window.              | [`PositionStore`], [`StoreOwner`]          |
//! | **Physics**       | Damped 2D integrator with board clamping.                  | [`PhysicsEngine`]                          |
//! | **Events**        | Runtime events fanned out to subscribers.                  | [`Event`], [`Subscribe`], [`LogWriter`]    |
//! | **Errors**        | Typed errors for workers, store and orchestration.         | [`WorkerError`], [`RuntimeError`]          |
//! | **Configuration** | Topology constants with defaults.                          | [`Config`]                                 |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use dronevisor::{Config, LogWriter, Orchestrator, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let orchestrator = Orchestrator::new(Config::default(), subs);
//!
//!     let (keys_tx, keys_rx) = tokio::sync::mpsc::channel(16);
//!     keys_tx.send('f').await?;
//!     keys_tx.send('q').await?;
//!
//!     let topology = orchestrator.topology(Some(keys_rx));
//!     let report = orchestrator.run(topology).await?;
//!     println!("first exit: {} (code {})", report.first.role, report.exit_code());
//!     Ok(())
//! }
//! ```
mod audit;
mod config;
mod core;
mod error;
mod events;
mod physics;
mod state;
mod subscribers;
mod topology;
mod workers;

// ---- Public re-exports ----

pub use audit::AuditLog;
pub use config::Config;
pub use core::{ExitStatus, Orchestrator, TopologyReport, WorkerExitRecord, WorkerHandle};
pub use error::{RuntimeError, StoreError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use physics::{PhysicsEngine, PhysicsParams};
pub use state::{
    ForceVector, BOARD_SIZE, PositionSample, PositionState, PositionStore, StoreNamespace,
    StoreOwner,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use topology::{
    AckSender, DisplayWiring, HandshakeReceiver, HandshakeSender, InputRouterWiring, KeyFeed,
    LivenessEndpoint, LivenessTable, Monitor, MonitorAction, MonitorEndpoints, PhysicsWiring,
    Probe, ProbeSender, ProcessTable, Role, SupervisorControl, SupervisorEvent, SupervisorWiring,
    TelemetryWiring, TerminationCause, Topology, WorkerId, Wiring,
};
pub use workers::{
    apply_key, DisplayWorker, InputRouter, PhysicsWorker, Supervisor, TelemetryWorker, Worker,
    WorkerContext, WorkerExit, QUIT_KEY,
};
