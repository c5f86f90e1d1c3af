//! Telemetry: creates the position store and logs the window periodically.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::WorkerError;
use crate::state::{PositionState, StoreNamespace, StoreOwner};
use crate::topology::{MonitorEndpoints, Role, TelemetryWiring};
use crate::workers::{Worker, WorkerContext, WorkerExit};

/// Owner of the position store.
///
/// The store stays linked for as long as `run` is alive; any exit path (error,
/// cancellation, abort) drops the owner guard and unlinks the name.
pub struct TelemetryWorker {
    namespace: StoreNamespace,
    store_name: String,
    refresh: Duration,
    monitor: Option<MonitorEndpoints>,
}

impl TelemetryWorker {
    pub fn new(cfg: &Config, namespace: StoreNamespace, wiring: TelemetryWiring) -> Self {
        Self {
            namespace,
            store_name: cfg.store_name.clone(),
            refresh: cfg.refresh_period,
            monitor: Some(wiring.monitor),
        }
    }
}

pub(crate) fn window_line(state: &PositionState) -> String {
    format!(
        "Initial Position: {} | Previous Position: {} | Current Position: {}",
        state.oldest(),
        state.previous(),
        state.current()
    )
}

#[async_trait]
impl Worker for TelemetryWorker {
    fn role(&self) -> Role {
        Role::Telemetry
    }

    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        self.monitor.take()
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        let owner = StoreOwner::create(&self.namespace, &self.store_name).await?;
        let store = owner.attach();
        ctx.audit
            .record(format!("Created position store {}", owner.name()))
            .await;

        loop {
            let state = store.read().await;
            ctx.audit.record(window_line(&state)).await;
            ctx.pause(self.refresh).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PositionSample;

    #[test]
    fn window_line_lists_oldest_first() {
        let state = PositionState::new(
            PositionSample::new(1.0, 2.0),
            PositionSample::new(3.0, 4.0),
            PositionSample::new(5.5, 6.25),
        );
        assert_eq!(
            window_line(&state),
            "Initial Position: (1.00, 2.00) | Previous Position: (3.00, 4.00) | Current Position: (5.50, 6.25)"
        );
    }
}
