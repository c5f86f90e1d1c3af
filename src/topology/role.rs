//! Worker roles and identities.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// One of the five fixed worker responsibilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Telemetry,
    Display,
    InputRouter,
    Physics,
    Supervisor,
}

impl Role {
    /// Spawn order of the topology.
    pub const ALL: [Role; 5] = [
        Role::Telemetry,
        Role::Display,
        Role::InputRouter,
        Role::Physics,
        Role::Supervisor,
    ];

    /// Roles probed by the supervisor, in probe order.
    pub const MONITORED: [Role; 4] = [
        Role::Telemetry,
        Role::Display,
        Role::InputRouter,
        Role::Physics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Telemetry => "telemetry",
            Role::Display => "display",
            Role::InputRouter => "input_router",
            Role::Physics => "physics",
            Role::Supervisor => "supervisor",
        }
    }

    /// File name of this role's audit log.
    pub fn log_file(&self) -> String {
        format!("{}.log", self.as_str())
    }

    /// Whether the supervisor's audit log is appended to across runs (the others are truncated).
    pub fn appends_audit(&self) -> bool {
        matches!(self, Role::Supervisor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Telemetry => "Telemetry",
            Role::Display => "Display",
            Role::InputRouter => "InputRouter",
            Role::Physics => "Physics",
            Role::Supervisor => "Supervisor",
        };
        f.write_str(name)
    }
}

/// Global identity counter; identities are never reused within a process.
static NEXT_WORKER_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a spawned worker (the counterpart of a process id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
