//! # Structured worker wiring.
//!
//! Each role receives a typed value naming only the endpoints it needs:
//!
//! ```text
//! Display ──keys──► InputRouter ──force (watch)──► Physics
//!    ▲                                                │
//!    key feed (operator)                              ▼
//! every monitored role ──handshake──► Supervisor ──probe──► every monitored role
//!                      ◄────────────── ack queue ─────────┘
//! ```
//!
//! [`Topology::wire`] builds the whole set in one place so that no worker can be
//! handed another role's channel. [`Wiring`]'s `Display` renders the grouped
//! `a|b|c` layout used in launch logs.

use std::fmt;

use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::state::ForceVector;
use crate::topology::handshake::{self, HandshakeReceiver};
use crate::topology::liveness::{
    probe_channel, supervisor_queue, MonitorEndpoints, ProbeSender, SupervisorControl,
    SupervisorEvent,
};
use crate::topology::Role;

/// Capacity of the Display → InputRouter key channel.
const KEY_QUEUE: usize = 32;

/// Operator keystroke source handed to Display; `None` runs without input.
pub type KeyFeed = Option<mpsc::Receiver<char>>;

pub struct TelemetryWiring {
    pub monitor: MonitorEndpoints,
}

pub struct DisplayWiring {
    /// Operator keystrokes.
    pub keys_in: KeyFeed,
    /// Forwarded keystrokes.
    pub keys_out: mpsc::Sender<char>,
    pub monitor: MonitorEndpoints,
}

pub struct InputRouterWiring {
    pub keys_in: mpsc::Receiver<char>,
    /// Latest force, read by Physics without blocking.
    pub force_out: watch::Sender<ForceVector>,
    pub monitor: MonitorEndpoints,
}

pub struct PhysicsWiring {
    pub force_in: watch::Receiver<ForceVector>,
    pub monitor: MonitorEndpoints,
}

pub struct SupervisorWiring {
    /// One receiver per monitored role, in probe order.
    pub handshakes: Vec<HandshakeReceiver>,
    /// One sender per monitored role, in probe order.
    pub probes: Vec<ProbeSender>,
    /// Acks and stop requests.
    pub events: mpsc::Receiver<SupervisorEvent>,
}

/// Endpoints of one role.
pub enum Wiring {
    Telemetry(TelemetryWiring),
    Display(DisplayWiring),
    InputRouter(InputRouterWiring),
    Physics(PhysicsWiring),
    Supervisor(SupervisorWiring),
}

impl Wiring {
    pub fn role(&self) -> Role {
        match self {
            Wiring::Telemetry(_) => Role::Telemetry,
            Wiring::Display(_) => Role::Display,
            Wiring::InputRouter(_) => Role::InputRouter,
            Wiring::Physics(_) => Role::Physics,
            Wiring::Supervisor(_) => Role::Supervisor,
        }
    }
}

impl fmt::Display for Wiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const TO_SUPERVISOR: &str = "handshake>supervisor|probe<supervisor|ack>supervisor";
        match self {
            Wiring::Telemetry(_) => f.write_str(TO_SUPERVISOR),
            Wiring::Display(w) => {
                let feed = if w.keys_in.is_some() { "keys<operator" } else { "keys<none" };
                write!(f, "{feed}|keys>input_router|{TO_SUPERVISOR}")
            }
            Wiring::InputRouter(_) => {
                write!(f, "keys<display|force>physics|{TO_SUPERVISOR}")
            }
            Wiring::Physics(_) => write!(f, "force<input_router|{TO_SUPERVISOR}"),
            Wiring::Supervisor(w) => {
                for (i, rx) in w.handshakes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    let role = rx.role().as_str();
                    write!(f, "handshake<{role}|probe>{role}")?;
                }
                f.write_str(" ack<all")
            }
        }
    }
}

/// The complete set of wirings for one topology run.
pub struct Topology {
    pub telemetry: TelemetryWiring,
    pub display: DisplayWiring,
    pub input_router: InputRouterWiring,
    pub physics: PhysicsWiring,
    pub supervisor: SupervisorWiring,
    /// Stop handle kept by the orchestrator.
    pub control: SupervisorControl,
}

impl Topology {
    /// Creates every channel of the fixed topology.
    pub fn wire(cfg: &Config, keys: KeyFeed) -> Self {
        let (acks, control, events) = supervisor_queue(cfg.supervisor_queue_clamped());

        let mut handshakes = Vec::with_capacity(Role::MONITORED.len());
        let mut probes = Vec::with_capacity(Role::MONITORED.len());
        let mut endpoints_for = |role: Role| {
            let (hs_tx, hs_rx) = handshake::channel(role);
            let (probe_tx, liveness) = probe_channel(role, acks.clone());
            handshakes.push(hs_rx);
            probes.push(probe_tx);
            MonitorEndpoints {
                handshake: hs_tx,
                liveness,
            }
        };
        // Probe order follows creation order.
        let telemetry = endpoints_for(Role::Telemetry);
        let display = endpoints_for(Role::Display);
        let input_router = endpoints_for(Role::InputRouter);
        let physics = endpoints_for(Role::Physics);

        let (keys_tx, keys_rx) = mpsc::channel(KEY_QUEUE);
        let (force_tx, force_rx) = watch::channel(ForceVector::ZERO);

        Self {
            telemetry: TelemetryWiring { monitor: telemetry },
            display: DisplayWiring {
                keys_in: keys,
                keys_out: keys_tx,
                monitor: display,
            },
            input_router: InputRouterWiring {
                keys_in: keys_rx,
                force_out: force_tx,
                monitor: input_router,
            },
            physics: PhysicsWiring {
                force_in: force_rx,
                monitor: physics,
            },
            supervisor: SupervisorWiring {
                handshakes,
                probes,
                events,
            },
            control,
        }
    }

    /// Splits into per-role wirings in spawn order plus the stop handle.
    pub fn into_parts(self) -> (Vec<Wiring>, SupervisorControl) {
        (
            vec![
                Wiring::Telemetry(self.telemetry),
                Wiring::Display(self.display),
                Wiring::InputRouter(self.input_router),
                Wiring::Physics(self.physics),
                Wiring::Supervisor(self.supervisor),
            ],
            self.control,
        )
    }
}
