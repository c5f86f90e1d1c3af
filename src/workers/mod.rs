//! The five roles of the topology and the [`Worker`] trait they implement.

mod display;
mod input_router;
mod physics;
mod supervisor;
mod telemetry;
mod worker;

pub use display::DisplayWorker;
pub use input_router::{apply_key, InputRouter};
pub use physics::PhysicsWorker;
pub use supervisor::Supervisor;
pub use telemetry::TelemetryWorker;
pub use worker::{Worker, WorkerContext, WorkerExit};

/// Key that ends the session.
pub const QUIT_KEY: char = 'q';
