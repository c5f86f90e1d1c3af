//! # Runs one worker from handshake to exit.
//!
//! ```text
//! take_monitor() ─► handshake.report(id) ─► AuditLog::open(role) ─► worker.run(ctx)
//!                                                                      │
//!                              terminate request (token) ──────────────┤ (drops run)
//!                                                                      ▼
//!                                                        publish WorkerExited
//! ```
//!
//! ## Rules
//! - A terminate request is unconditional: whatever the worker awaits is dropped,
//!   and every guard it holds (e.g. the store owner) is released on the way out.
//! - A result produced in the same poll as the terminate request wins over it.
//! - Exactly one `WorkerExited` is published per worker that returns (panics are
//!   reported by the orchestrator).

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::audit::AuditLog;
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::topology::{Role, WorkerId};
use crate::workers::{Worker, WorkerContext, WorkerExit};

pub(crate) async fn run_worker(
    mut worker: Box<dyn Worker>,
    id: WorkerId,
    token: CancellationToken,
    bus: Bus,
    log_dir: Option<PathBuf>,
) -> Result<WorkerExit, WorkerError> {
    let role = worker.role();
    let res = tokio::select! {
        biased;
        res = drive(worker.as_mut(), id, token.clone(), bus.clone(), log_dir) => res,
        _ = token.cancelled() => Err(WorkerError::Terminated),
    };
    publish_exited(&bus, role, id, &res);
    res
}

async fn drive(
    worker: &mut dyn Worker,
    id: WorkerId,
    token: CancellationToken,
    bus: Bus,
    log_dir: Option<PathBuf>,
) -> Result<WorkerExit, WorkerError> {
    let role = worker.role();
    let liveness = match worker.take_monitor() {
        Some(monitor) => {
            monitor.handshake.report(id)?;
            Some(monitor.liveness)
        }
        None => None,
    };
    let audit = AuditLog::open(log_dir.as_deref(), role).await?;

    let mut ctx = WorkerContext::new(id, role, token, bus, audit, liveness);
    worker.run(&mut ctx).await
}

fn publish_exited(bus: &Bus, role: Role, id: WorkerId, res: &Result<WorkerExit, WorkerError>) {
    let ev = Event::new(EventKind::WorkerExited)
        .with_role(role)
        .with_worker(id);
    let ev = match res {
        Ok(_) => ev.with_exit_code(0),
        Err(e) => ev.with_exit_code(e.exit_code()).with_reason(e.to_string()),
    };
    bus.publish(ev);
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::topology::{handshake, liveness, MonitorEndpoints};

    struct Idle {
        monitor: Option<MonitorEndpoints>,
    }

    #[async_trait]
    impl Worker for Idle {
        fn role(&self) -> Role {
            Role::Telemetry
        }

        fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
            self.monitor.take()
        }

        async fn run(&mut self, _ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn reports_identity_then_stops_on_terminate() {
        let (acks, _control, _events) = liveness::supervisor_queue(4);
        let (hs_tx, hs_rx) = handshake::channel(Role::Telemetry);
        let (_probes, endpoint) = liveness::probe_channel(Role::Telemetry, acks);
        let worker = Idle {
            monitor: Some(MonitorEndpoints {
                handshake: hs_tx,
                liveness: endpoint,
            }),
        };

        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let id = WorkerId::next();
        let token = CancellationToken::new();
        let join = tokio::spawn(run_worker(Box::new(worker), id, token.clone(), bus, None));

        assert_eq!(hs_rx.receive(None).await.unwrap(), id);
        token.cancel();
        let err = join.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::Terminated));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::WorkerExited);
        assert_eq!(ev.exit_code, Some(143));
    }
}
