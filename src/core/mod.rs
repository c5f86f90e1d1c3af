//! Runtime core: spawning, running and tearing down the topology.
//!
//! - [`orchestrator`]: spawns the fixed topology, waits for the first exit, tears down within a grace period;
//! - [`runner`]: runs one worker from handshake to exit and publishes its exit;
//! - [`shutdown`]: OS termination signals forwarded as an external stop.

mod orchestrator;
mod runner;
mod shutdown;

pub use orchestrator::{ExitStatus, Orchestrator, TopologyReport, WorkerExitRecord, WorkerHandle};
