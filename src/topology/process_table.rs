//! # Process table: identity → terminate request.
//!
//! Every spawned worker is registered with its own [`CancellationToken`]. A terminate
//! request cancels that token, and is delivered at most once per worker no matter how
//! many parties (the supervisor fan-out, the orchestrator teardown) ask for it.
//!
//! ## Rules
//! - `request_terminate` returns `true` only for the call that actually delivered.
//! - Every delivery publishes `TerminateSent`.
//! - The worker behind a delivered request (if any) is kept, so a cascade can be
//!   traced back to whoever started it.
//! - Unknown identities are ignored.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::topology::{Role, WorkerId};

struct Entry {
    role: Role,
    token: CancellationToken,
    terminated: bool,
    requested_by: Option<WorkerId>,
}

/// Registry of spawned workers and their terminate tokens.
pub struct ProcessTable {
    entries: RwLock<HashMap<WorkerId, Entry>>,
    bus: Bus,
}

impl ProcessTable {
    pub fn new(bus: Bus) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Registers a spawned worker.
    pub async fn register(&self, id: WorkerId, role: Role, token: CancellationToken) {
        self.entries.write().await.insert(
            id,
            Entry {
                role,
                token,
                terminated: false,
                requested_by: None,
            },
        );
    }

    /// Delivers a terminate request to `id`, once, on behalf of the runtime.
    pub async fn request_terminate(&self, id: WorkerId) -> bool {
        self.deliver(id, None).await
    }

    /// Delivers a terminate request to `id`, once, on behalf of worker `from`.
    pub async fn request_terminate_from(&self, from: WorkerId, id: WorkerId) -> bool {
        self.deliver(id, Some(from)).await
    }

    /// Worker whose request terminated `id`; `None` if the runtime asked or nobody did.
    pub async fn requested_by(&self, id: WorkerId) -> Option<WorkerId> {
        self.entries
            .read()
            .await
            .get(&id)
            .and_then(|e| e.requested_by)
    }

    async fn deliver(&self, id: WorkerId, from: Option<WorkerId>) -> bool {
        let role = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(&id) {
                Some(entry) if !entry.terminated => {
                    entry.terminated = true;
                    entry.requested_by = from;
                    entry.token.cancel();
                    entry.role
                }
                _ => return false,
            }
        };

        self.bus.publish(
            Event::new(EventKind::TerminateSent)
                .with_role(role)
                .with_worker(id),
        );
        true
    }

    pub async fn is_terminated(&self, id: WorkerId) -> bool {
        self.entries
            .read()
            .await
            .get(&id)
            .is_some_and(|e| e.terminated)
    }

    /// Registered `(identity, role)` pairs in role order.
    pub async fn members(&self) -> Vec<(WorkerId, Role)> {
        let mut out: Vec<(WorkerId, Role)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(id, e)| (*id, e.role))
            .collect();
        out.sort_unstable_by_key(|(id, role)| (*role, *id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminate_is_delivered_once() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let table = ProcessTable::new(bus);
        let id = WorkerId::next();
        let token = CancellationToken::new();
        table.register(id, Role::Physics, token.clone()).await;

        assert!(table.request_terminate(id).await);
        assert!(!table.request_terminate(id).await);
        assert!(token.is_cancelled());
        assert!(table.is_terminated(id).await);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TerminateSent);
        assert_eq!(ev.role, Some(Role::Physics));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_identity_is_ignored() {
        let table = ProcessTable::new(Bus::new(4));
        assert!(!table.request_terminate(WorkerId::next()).await);
        assert_eq!(table.requested_by(WorkerId::next()).await, None);
    }

    #[tokio::test]
    async fn first_requester_is_remembered() {
        let table = ProcessTable::new(Bus::new(16));
        let sup = WorkerId::next();
        let tel = WorkerId::next();
        table.register(sup, Role::Supervisor, CancellationToken::new()).await;
        table.register(tel, Role::Telemetry, CancellationToken::new()).await;

        assert!(table.request_terminate_from(sup, tel).await);
        assert!(!table.request_terminate(tel).await);
        assert_eq!(table.requested_by(tel).await, Some(sup));

        assert!(table.request_terminate(sup).await);
        assert_eq!(table.requested_by(sup).await, None);
    }

    #[tokio::test]
    async fn members_are_listed_in_role_order() {
        let table = ProcessTable::new(Bus::new(4));
        let sup = WorkerId::next();
        let tel = WorkerId::next();
        table.register(sup, Role::Supervisor, CancellationToken::new()).await;
        table.register(tel, Role::Telemetry, CancellationToken::new()).await;

        assert_eq!(
            table.members().await,
            vec![(tel, Role::Telemetry), (sup, Role::Supervisor)]
        );
    }
}
