//! Physics: integrates the drone position and writes it back to the store.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::Config;
use crate::error::WorkerError;
use crate::events::{Event, EventKind};
use crate::physics::PhysicsEngine;
use crate::state::{ForceVector, PositionState, PositionStore, StoreNamespace};
use crate::topology::{MonitorEndpoints, PhysicsWiring, Role};
use crate::workers::{Worker, WorkerContext, WorkerExit};

/// Steady-state writer of the position store.
///
/// Idle until the first force arrives; then reads the store once and ticks every
/// period from its own copy of the window, reusing the latest force.
pub struct PhysicsWorker {
    namespace: StoreNamespace,
    store_name: String,
    attach_timeout: Duration,
    period: Duration,
    engine: PhysicsEngine,
    force_in: watch::Receiver<ForceVector>,
    monitor: Option<MonitorEndpoints>,
}

impl PhysicsWorker {
    pub fn new(cfg: &Config, namespace: StoreNamespace, wiring: PhysicsWiring) -> Self {
        Self {
            namespace,
            store_name: cfg.store_name.clone(),
            attach_timeout: cfg.attach_timeout,
            period: cfg.physics_period,
            engine: PhysicsEngine::new(cfg.physics()),
            force_in: wiring.force_in,
            monitor: Some(wiring.monitor),
        }
    }
}

/// Non-blocking poll for a newer force; a closed channel reads as "no data".
fn poll_force(rx: &mut watch::Receiver<ForceVector>) -> Option<ForceVector> {
    match rx.has_changed() {
        Ok(true) => Some(*rx.borrow_and_update()),
        Ok(false) | Err(_) => None,
    }
}

#[async_trait]
impl Worker for PhysicsWorker {
    fn role(&self) -> Role {
        Role::Physics
    }

    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        self.monitor.take()
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        let store =
            PositionStore::attach(&self.namespace, &self.store_name, self.attach_timeout).await?;
        let mut window: Option<PositionState> = None;

        loop {
            let incoming = poll_force(&mut self.force_in);
            if let Some(force) = self.engine.observe(incoming) {
                let before = match window {
                    Some(w) => w,
                    None => store.read().await,
                };
                let after = self.engine.tick(force, &before);
                store.write(after).await;
                window = Some(after);

                let line = format!(
                    "Previous position: {} | Updated Position: {}",
                    before.current(),
                    after.current()
                );
                ctx.audit.record(&line).await;
                ctx.bus.publish(
                    Event::new(EventKind::PositionUpdated)
                        .with_role(Role::Physics)
                        .with_worker(ctx.id)
                        .with_reason(line),
                );
            }
            ctx.pause(self.period).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_drains_to_the_latest_force() {
        let (tx, mut rx) = watch::channel(ForceVector::ZERO);
        assert_eq!(poll_force(&mut rx), None);

        tx.send(ForceVector::new(1, 0)).unwrap();
        tx.send(ForceVector::new(1, 1)).unwrap();
        assert_eq!(poll_force(&mut rx), Some(ForceVector::new(1, 1)));
        assert_eq!(poll_force(&mut rx), None);

        drop(tx);
        assert_eq!(poll_force(&mut rx), None);
    }
}
