//! Display: headless view of the drone.
//!
//! Seeds the store with the board centre, forwards operator keys to the input
//! router and logs the current position on every refresh.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::config::Config;
use crate::error::WorkerError;
use crate::state::{PositionSample, PositionState, PositionStore, StoreNamespace};
use crate::topology::{DisplayWiring, KeyFeed, MonitorEndpoints, Role};
use crate::workers::{Worker, WorkerContext, WorkerExit, QUIT_KEY};

pub struct DisplayWorker {
    namespace: StoreNamespace,
    store_name: String,
    attach_timeout: Duration,
    refresh: Duration,
    keys_in: KeyFeed,
    keys_out: mpsc::Sender<char>,
    monitor: Option<MonitorEndpoints>,
}

impl DisplayWorker {
    pub fn new(cfg: &Config, namespace: StoreNamespace, wiring: DisplayWiring) -> Self {
        Self {
            namespace,
            store_name: cfg.store_name.clone(),
            attach_timeout: cfg.attach_timeout,
            refresh: cfg.refresh_period,
            keys_in: wiring.keys_in,
            keys_out: wiring.keys_out,
            monitor: Some(wiring.monitor),
        }
    }
}

/// Next operator key; pending forever once the feed is gone.
async fn next_key(feed: &mut KeyFeed) -> Option<char> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl Worker for DisplayWorker {
    fn role(&self) -> Role {
        Role::Display
    }

    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        self.monitor.take()
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        let store =
            PositionStore::attach(&self.namespace, &self.store_name, self.attach_timeout).await?;

        let centre = PositionState::uniform(PositionSample::center());
        store.write(centre).await;
        ctx.audit
            .record(format!("Initial Position: {}", centre.current()))
            .await;

        let token = ctx.token.clone();
        let mut refresh = time::interval(self.refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WorkerError::Terminated),
                probe = ctx.next_probe() => ctx.acknowledge(probe),
                key = next_key(&mut self.keys_in) => match key {
                    Some(key) => {
                        self.keys_out.send(key).await.map_err(|_| {
                            WorkerError::communication("key channel to input router closed")
                        })?;
                        if key == QUIT_KEY {
                            ctx.audit.record("Quit requested").await;
                            return Ok(WorkerExit::Quit);
                        }
                    }
                    None => {
                        tracing::debug!("key feed closed; display continues without input");
                        self.keys_in = None;
                    }
                },
                _ = refresh.tick() => {
                    let state = store.read().await;
                    ctx.audit
                        .record(format!("Current Position: {}", state.current()))
                        .await;
                }
            }
        }
    }
}
