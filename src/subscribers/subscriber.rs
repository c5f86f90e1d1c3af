//! # The [`Subscribe`] trait.
//!
//! Subscribers observe runtime events (spawns, handshakes, probe rounds, exits,
//! teardown) without taking part in the topology. Each one runs behind its own
//! bounded queue in [`SubscriberSet`](crate::SubscriberSet): a slow or panicking
//! subscriber never delays a worker, it only loses its own events.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use dronevisor::{Event, EventKind, Subscribe};
//!
//! struct DeadRoleAlert;
//!
//! #[async_trait]
//! impl Subscribe for DeadRoleAlert {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::LivenessExceeded {
//!             eprintln!("dead roles: {}", ev.reason.as_deref().unwrap_or("?"));
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "dead-role-alert"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of runtime events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event, in publish order for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Name carried by overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue depth before events are dropped for this subscriber (min 1).
    fn queue_capacity(&self) -> usize {
        256
    }
}
