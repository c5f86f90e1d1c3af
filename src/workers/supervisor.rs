//! # Supervisor: handshake bootstrap, liveness rounds, teardown.
//!
//! ```text
//! Bootstrapping:  receive identity from Telemetry, Display, InputRouter, Physics (in order)
//!                 ExternalStop or terminate request aborts the wait
//!        │
//!        ▼
//! Monitoring:     select! {
//!                   terminate request  → Err(Terminated)
//!                   events queue       → AckReceived(id) | ExternalStop
//!                   interval(delay)    → RoundTick
//!                 } ─► Monitor::handle ─► actions
//!        │
//!        ▼
//! Terminating:    terminate every tracked worker, then itself; exit non-zero
//! ```
//!
//! Queued events are drained before the next tick, so an ack that arrived during
//! the last probe delay of a round counts for that round.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::config::Config;
use crate::error::WorkerError;
use crate::events::{Event, EventKind};
use crate::topology::{
    render_counters, HandshakeReceiver, LivenessTable, Monitor, MonitorAction, Probe,
    ProbeSender, ProcessTable, Role, SupervisorEvent, SupervisorWiring, TerminationCause,
    WorkerId,
};
use crate::workers::{Worker, WorkerContext, WorkerExit};

pub struct Supervisor {
    threshold: u32,
    probe_delay: Duration,
    handshake_bound: Option<Duration>,
    handshakes: Vec<HandshakeReceiver>,
    probes: Vec<ProbeSender>,
    events: mpsc::Receiver<SupervisorEvent>,
    events_open: bool,
    table: Arc<ProcessTable>,
}

impl Supervisor {
    pub fn new(cfg: &Config, wiring: SupervisorWiring, table: Arc<ProcessTable>) -> Self {
        Self {
            threshold: cfg.liveness_threshold,
            probe_delay: cfg.probe_delay,
            handshake_bound: cfg.handshake_bound(),
            handshakes: wiring.handshakes,
            probes: wiring.probes,
            events: wiring.events,
            events_open: true,
            table,
        }
    }

    /// Next queued event; pending forever once every sender is gone.
    async fn next_event(&mut self) -> SupervisorEvent {
        if self.events_open {
            if let Some(ev) = self.events.recv().await {
                return ev;
            }
            self.events_open = false;
        }
        std::future::pending().await
    }

    /// Waits for an external stop, ignoring anything else queued.
    async fn stop_requested(&mut self) {
        while self.next_event().await != SupervisorEvent::ExternalStop {}
    }

    async fn bootstrap(
        &mut self,
        ctx: &mut WorkerContext,
    ) -> Result<Result<Vec<(Role, WorkerId)>, TerminationCause>, WorkerError> {
        let token = ctx.token.clone();
        let bound = self.handshake_bound;
        let mut members = Vec::with_capacity(self.handshakes.len());

        for rx in std::mem::take(&mut self.handshakes) {
            let role = rx.role();
            let id = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WorkerError::Terminated),
                _ = self.stop_requested() => return Ok(Err(TerminationCause::ExternalStop)),
                id = rx.receive(bound) => id?,
            };

            ctx.audit
                .record(format!("Received identity from {role}: {id}"))
                .await;
            ctx.bus.publish(
                Event::new(EventKind::HandshakeReceived)
                    .with_role(role)
                    .with_worker(id),
            );
            members.push((role, id));
        }
        Ok(Ok(members))
    }

    async fn apply(
        &self,
        ctx: &WorkerContext,
        action: MonitorAction,
    ) -> Result<Option<TerminationCause>, WorkerError> {
        match action {
            MonitorAction::Probe { role, round, .. } => {
                if let Some(tx) = self.probes.iter().find(|p| p.role() == role) {
                    tx.send(Probe { round })?;
                }
            }
            MonitorAction::RoundCompleted { round, counters } => {
                let rendered = render_counters(&counters);
                ctx.audit
                    .record(format!("Signals sent to processes: {rendered}"))
                    .await;
                ctx.bus.publish(
                    Event::new(EventKind::ProbeRoundCompleted)
                        .with_round(round)
                        .with_reason(rendered),
                );
            }
            MonitorAction::Acknowledged { role, worker } => {
                ctx.audit
                    .record(format!("Received ack from {role} ({worker})"))
                    .await;
                ctx.bus.publish(
                    Event::new(EventKind::AckReceived)
                        .with_role(role)
                        .with_worker(worker),
                );
            }
            MonitorAction::Terminate(cause) => return Ok(Some(cause)),
        }
        Ok(None)
    }

    /// Terminates every tracked worker, then itself.
    async fn teardown(&self, ctx: &WorkerContext, cause: TerminationCause) -> WorkerError {
        match &cause {
            TerminationCause::LivenessExceeded { round, roles } => {
                let dead = format!("{roles:?}");
                ctx.audit
                    .record(format!(
                        "Supervisor terminated due to process counters exceeding the threshold: {dead}"
                    ))
                    .await;
                ctx.bus.publish(
                    Event::new(EventKind::LivenessExceeded)
                        .with_round(*round)
                        .with_reason(dead),
                );
            }
            TerminationCause::ExternalStop => {
                ctx.audit.record("Supervisor received an external stop").await;
            }
        }

        for (id, _) in self.table.members().await {
            if id != ctx.id {
                self.table.request_terminate_from(ctx.id, id).await;
            }
        }
        ctx.audit.record("Supervisor terminated all processes").await;

        let err = cause.into_error();
        ctx.bus.publish(
            Event::new(EventKind::TopologyTerminated)
                .with_role(Role::Supervisor)
                .with_worker(ctx.id)
                .with_reason(err.to_string()),
        );
        self.table.request_terminate_from(ctx.id, ctx.id).await;
        err
    }
}

#[async_trait]
impl Worker for Supervisor {
    fn role(&self) -> Role {
        Role::Supervisor
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        let members = match self.bootstrap(ctx).await? {
            Ok(members) => members,
            Err(cause) => return Err(self.teardown(ctx, cause).await),
        };
        ctx.audit
            .record(format!("Monitoring {} processes", members.len()))
            .await;

        let token = ctx.token.clone();
        let mut monitor = Monitor::new(LivenessTable::new(self.threshold, members));
        let mut ticks = time::interval(self.probe_delay);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WorkerError::Terminated),
                ev = self.next_event() => ev,
                _ = ticks.tick() => SupervisorEvent::RoundTick,
            };

            for action in monitor.handle(event) {
                if let Some(cause) = self.apply(ctx, action).await? {
                    return Err(self.teardown(ctx, cause).await);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::audit::AuditLog;
    use crate::events::Bus;
    use crate::topology::{MonitorEndpoints, Topology};

    struct Rig {
        supervisor: Supervisor,
        ctx: WorkerContext,
        table: Arc<ProcessTable>,
        endpoints: Vec<(WorkerId, CancellationToken, MonitorEndpoints)>,
        control: crate::topology::SupervisorControl,
    }

    async fn rig(cfg: Config) -> Rig {
        let topo = Topology::wire(&cfg, None);
        let bus = Bus::new(256);
        let table = Arc::new(ProcessTable::new(bus.clone()));

        let mut endpoints = Vec::new();
        for (role, monitor) in [
            (Role::Telemetry, topo.telemetry.monitor),
            (Role::Display, topo.display.monitor),
            (Role::InputRouter, topo.input_router.monitor),
            (Role::Physics, topo.physics.monitor),
        ] {
            let id = WorkerId::next();
            let token = CancellationToken::new();
            table.register(id, role, token.clone()).await;
            endpoints.push((id, token, monitor));
        }

        let id = WorkerId::next();
        let token = CancellationToken::new();
        table.register(id, Role::Supervisor, token.clone()).await;
        let ctx = WorkerContext::new(
            id,
            Role::Supervisor,
            token,
            bus,
            AuditLog::memory(Role::Supervisor),
            None,
        );
        Rig {
            supervisor: Supervisor::new(&cfg, topo.supervisor, Arc::clone(&table)),
            ctx,
            table,
            endpoints,
            control: topo.control,
        }
    }

    fn fast() -> Config {
        Config {
            probe_delay: Duration::from_millis(10),
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_role_tears_everything_down() {
        let Rig {
            mut supervisor,
            mut ctx,
            table,
            endpoints,
            ..
        } = rig(fast()).await;

        let mut responders = Vec::new();
        let mut tokens = Vec::new();
        for (i, (id, token, monitor)) in endpoints.into_iter().enumerate() {
            monitor.handshake.report(id).unwrap();
            tokens.push(token.clone());
            let mut liveness = monitor.liveness;
            let silent = i == 3;
            responders.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        probe = liveness.next_probe() => match probe {
                            Some(_) if !silent => { liveness.acknowledge(id); }
                            Some(_) => {}
                            None => break,
                        }
                    }
                }
            }));
        }

        let err = supervisor.run(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::LivenessFailure { ref roles } if roles == &vec![Role::Physics]
        ));

        for token in &tokens {
            assert!(token.is_cancelled());
        }
        assert!(ctx.token.is_cancelled());
        for (id, _) in table.members().await {
            assert!(table.is_terminated(id).await);
            assert_eq!(table.requested_by(id).await, Some(ctx.id));
        }

        let lines = ctx.audit.lines();
        let rounds = lines
            .iter()
            .filter(|l| l.contains("Signals sent to processes:"))
            .count();
        assert_eq!(rounds, 6);
        assert!(lines
            .last()
            .unwrap()
            .ends_with("Supervisor terminated all processes"));

        for r in responders {
            r.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn external_stop_during_bootstrap_terminates() {
        let Rig {
            mut supervisor,
            mut ctx,
            endpoints,
            control,
            ..
        } = rig(fast()).await;

        assert!(control.request_stop().await);
        let err = supervisor.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, WorkerError::ExternalStop));
        for (_, token, _) in &endpoints {
            assert!(token.is_cancelled());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dead_worker_before_handshake_is_a_communication_failure() {
        let Rig {
            mut supervisor,
            mut ctx,
            endpoints,
            ..
        } = rig(fast()).await;
        drop(endpoints);

        let err = supervisor.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.as_label(), "worker_communication");
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_bootstrap_times_out() {
        let cfg = Config {
            handshake_timeout: Duration::from_millis(100),
            ..fast()
        };
        let Rig {
            mut supervisor,
            mut ctx,
            endpoints,
            ..
        } = rig(cfg).await;

        let err = supervisor.run(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::HandshakeTimeout {
                role: Role::Telemetry,
                ..
            }
        ));
        drop(endpoints);
    }
}
