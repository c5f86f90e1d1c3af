//! # Runtime configuration.
//!
//! Provides [`Config`], the single place holding the topology constants: physics
//! parameters, supervision timing, store name and teardown behavior.
//!
//! ## Sentinel values
//! - `handshake_timeout = 0s` → the supervisor waits forever for handshakes
//! - `log_dir = None` → audit logs are discarded

use std::path::PathBuf;
use std::time::Duration;

use crate::physics::PhysicsParams;

/// Global configuration for one topology run.
///
/// ## Field semantics
/// - `mass`, `stiffness`, `timestep`: integrator constants (M, K, T)
/// - `liveness_threshold`: a role is dead once its miss counter exceeds this
/// - `probe_delay`: pause after each probe; a round is four of them
/// - `physics_period`: sleep between physics ticks
/// - `refresh_period`: display/telemetry refresh interval
/// - `grace`: how long teardown waits before aborting stragglers
/// - `attach_timeout`: how long a worker waits for the store to be published
/// - `handshake_timeout`: bootstrap bound per handshake (`0s` = unbounded)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Drone mass.
    pub mass: f64,
    /// Damping stiffness.
    pub stiffness: f64,
    /// Integration timestep.
    pub timestep: f64,

    /// Number of consecutive unacknowledged probes tolerated per role.
    pub liveness_threshold: u32,
    /// Delay between two probes within a supervision round.
    pub probe_delay: Duration,
    /// Sleep between physics ticks.
    pub physics_period: Duration,
    /// Refresh interval of the display and telemetry loops.
    pub refresh_period: Duration,

    /// Teardown grace period before remaining workers are aborted.
    pub grace: Duration,
    /// Maximum wait for the position store to be created by telemetry.
    pub attach_timeout: Duration,
    /// Maximum wait per handshake during bootstrap.
    ///
    /// - `Duration::ZERO` = wait forever (a silent worker stalls bootstrap)
    /// - `> 0` = bootstrap fails with [`WorkerError::HandshakeTimeout`](crate::WorkerError)
    pub handshake_timeout: Duration,

    /// Name of the shared position store.
    pub store_name: String,
    /// Directory receiving one audit file per role; `None` discards audit lines.
    pub log_dir: Option<PathBuf>,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,
    /// Capacity of the supervisor's event queue (acks and stop requests, min 1).
    pub supervisor_queue: usize,
    /// Forward OS termination signals to the supervisor.
    pub handle_os_signals: bool,
}

impl Config {
    /// Integrator constants as a [`PhysicsParams`].
    #[inline]
    pub fn physics(&self) -> PhysicsParams {
        PhysicsParams {
            mass: self.mass,
            stiffness: self.stiffness,
            timestep: self.timestep,
        }
    }

    /// Returns the bootstrap handshake bound as an `Option`.
    ///
    /// - `None` → wait forever
    /// - `Some(d)` → fail after `d` per handshake
    #[inline]
    pub fn handshake_bound(&self) -> Option<Duration> {
        if self.handshake_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handshake_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the supervisor queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn supervisor_queue_clamped(&self) -> usize {
        self.supervisor_queue.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `M/K/T = 1.0/1.0/0.5`
    /// - `liveness_threshold = 5`
    /// - `probe_delay = 50ms`, `physics_period = 300ms`, `refresh_period = 1s`
    /// - `grace = 2s`, `attach_timeout = 2s`, `handshake_timeout = 0s` (unbounded)
    /// - `store_name = "/drone_position"`, `log_dir = Some("log")`
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 1.0,
            timestep: 0.5,
            liveness_threshold: 5,
            probe_delay: Duration::from_millis(50),
            physics_period: Duration::from_millis(300),
            refresh_period: Duration::from_secs(1),
            grace: Duration::from_secs(2),
            attach_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::ZERO,
            store_name: "/drone_position".to_string(),
            log_dir: Some(PathBuf::from("log")),
            bus_capacity: 1024,
            supervisor_queue: 64,
            handle_os_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_handshake_timeout_means_unbounded() {
        let mut cfg = Config::default();
        assert_eq!(cfg.handshake_bound(), None);

        cfg.handshake_timeout = Duration::from_secs(3);
        assert_eq!(cfg.handshake_bound(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn capacities_are_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            supervisor_queue: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.supervisor_queue_clamped(), 1);
    }
}
