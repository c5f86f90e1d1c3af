//! Roles, identities and the channels that connect them.
//!
//! - [`Role`] / [`WorkerId`]: who is who
//! - [`handshake`]: one-shot identity report to the supervisor
//! - [`liveness`]: probe/ack protocol and the supervisor's [`Monitor`]
//! - [`ProcessTable`]: at-most-once terminate requests
//! - [`Topology`] / [`Wiring`]: per-role endpoints of the fixed topology

pub(crate) mod handshake;
pub(crate) mod liveness;
mod process_table;
mod role;
mod wiring;

pub use handshake::{HandshakeReceiver, HandshakeSender};
pub use liveness::{
    render_counters, AckSender, LivenessEndpoint, LivenessTable, Monitor, MonitorAction,
    MonitorEndpoints, Probe, ProbeSender, SupervisorControl, SupervisorEvent, TerminationCause,
};
pub use process_table::ProcessTable;
pub use role::{Role, WorkerId};
pub use wiring::{
    DisplayWiring, InputRouterWiring, KeyFeed, PhysicsWiring, SupervisorWiring, TelemetryWiring,
    Topology, Wiring,
};
