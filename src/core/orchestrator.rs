//! # Orchestrator: spawns the fixed topology and tears it down on the first exit.
//!
//! The [`Orchestrator`] owns the event bus, the [`SubscriberSet`], the
//! [`ProcessTable`] and the [`StoreNamespace`] shared by one topology.
//!
//! ## High-level flow
//! ```text
//! run(topology):
//!   Topology::into_parts() ─► [Telemetry, Display, InputRouter, Physics, Supervisor]
//!        │
//!        └─► spawn(wiring) for each, in order
//!              └─► build worker from wiring ─► register token ─► tokio::spawn(run_worker)
//!
//!   supervise(handles, control):
//!     OS signal (optional) ──► publish ShutdownRequested ──► control.request_stop()
//!     await_any_exit(handles) ─► first exit (any kind, including quit)
//!     first terminated by a peer? ─► that peer becomes the origin of the teardown
//!     terminate_others(handles, first + origin)   (at most once per worker)
//!     wait_with_grace(grace):
//!        ├─ all joined       → publish AllStoppedWithin → TopologyReport (origin first)
//!        └─ grace exceeded   → abort stragglers, publish GraceExceeded → RuntimeError::GraceExceeded
//! ```
//!
//! There is no expected exit: a clean quit tears the topology down exactly like a
//! failure does, only the first worker's exit status differs.

use std::sync::Arc;

use futures::future::select_all;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{runner, shutdown};
use crate::error::{RuntimeError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::state::StoreNamespace;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::topology::{
    KeyFeed, ProcessTable, Role, SupervisorControl, Topology, WorkerId, Wiring,
};
use crate::workers::{
    DisplayWorker, InputRouter, PhysicsWorker, Supervisor, TelemetryWorker, Worker, WorkerExit,
};

/// How a worker's task ended.
#[derive(Debug)]
pub enum ExitStatus {
    /// Returned without error.
    Exited(WorkerExit),
    /// Returned an error.
    Failed(WorkerError),
    /// Panicked, with the payload if it was a string.
    Panicked(String),
    /// Aborted by the orchestrator.
    Aborted,
}

impl ExitStatus {
    /// Process-style exit code: 0 only for a clean exit.
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(_) => 0,
            ExitStatus::Failed(e) => e.exit_code(),
            ExitStatus::Panicked(_) => 101,
            ExitStatus::Aborted => 137,
        }
    }

    fn from_join(res: Result<Result<WorkerExit, WorkerError>, JoinError>) -> Self {
        match res {
            Ok(Ok(exit)) => ExitStatus::Exited(exit),
            Ok(Err(e)) => ExitStatus::Failed(e),
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                let info = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                ExitStatus::Panicked(info)
            }
            Err(_) => ExitStatus::Aborted,
        }
    }
}

/// Exit of one worker.
#[derive(Debug)]
pub struct WorkerExitRecord {
    pub role: Role,
    pub id: WorkerId,
    pub status: ExitStatus,
}

/// Outcome of one topology run.
#[derive(Debug)]
pub struct TopologyReport {
    /// The exit that triggered teardown.
    ///
    /// When a worker (the supervisor) terminated its peers itself, this is that
    /// worker's exit rather than whichever terminated peer happened to finish first.
    pub first: WorkerExitRecord,
    /// Everyone else, in the order they finished.
    pub others: Vec<WorkerExitRecord>,
}

impl TopologyReport {
    /// Exit code of the whole run: the first exit decides.
    pub fn exit_code(&self) -> i32 {
        self.first.status.code()
    }

    /// Record of `role`, wherever it finished.
    pub fn record(&self, role: Role) -> Option<&WorkerExitRecord> {
        std::iter::once(&self.first)
            .chain(self.others.iter())
            .find(|r| r.role == role)
    }
}

/// Handle to a spawned worker.
pub struct WorkerHandle {
    role: Role,
    id: WorkerId,
    join: JoinHandle<Result<WorkerExit, WorkerError>>,
}

impl WorkerHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }
}

/// Spawns and supervises one topology.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    table: Arc<ProcessTable>,
    namespace: StoreNamespace,
    listener: JoinHandle<()>,
    listener_stop: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator and starts forwarding bus events to `subscribers`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        let table = Arc::new(ProcessTable::new(bus.clone()));
        let listener_stop = CancellationToken::new();
        let listener = Self::subscriber_listener(&bus, &subs, listener_stop.clone());

        Self {
            cfg,
            bus,
            subs,
            table,
            namespace: StoreNamespace::new(),
            listener,
            listener_stop,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn namespace(&self) -> &StoreNamespace {
        &self.namespace
    }

    pub fn process_table(&self) -> &Arc<ProcessTable> {
        &self.table
    }

    /// Wires a fresh topology; `keys` feeds Display.
    pub fn topology(&self, keys: KeyFeed) -> Topology {
        Topology::wire(&self.cfg, keys)
    }

    /// Forwards bus events to the subscriber set until `stop` fires and the bus is empty.
    fn subscriber_listener(
        bus: &Bus,
        subs: &Arc<SubscriberSet>,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let set = Arc::clone(subs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
        })
    }

    /// Stops forwarding events and waits until every subscriber has handled the
    /// events it was already sent.
    ///
    /// Call after the last run, before the process exits.
    pub async fn shutdown(self) {
        self.listener_stop.cancel();
        if let Err(e) = self.listener.await {
            tracing::warn!(error = %e, "subscriber listener ended abnormally");
        }
        match Arc::try_unwrap(self.subs) {
            Ok(set) => set.shutdown().await,
            Err(_) => tracing::warn!("subscriber set still shared, not drained"),
        }
    }

    /// Builds the worker for a role, passing only that role's endpoints.
    pub fn build(&self, wiring: Wiring) -> Box<dyn Worker> {
        let ns = self.namespace.clone();
        match wiring {
            Wiring::Telemetry(w) => Box::new(TelemetryWorker::new(&self.cfg, ns, w)),
            Wiring::Display(w) => Box::new(DisplayWorker::new(&self.cfg, ns, w)),
            Wiring::InputRouter(w) => Box::new(InputRouter::new(w)),
            Wiring::Physics(w) => Box::new(PhysicsWorker::new(&self.cfg, ns, w)),
            Wiring::Supervisor(w) => {
                Box::new(Supervisor::new(&self.cfg, w, Arc::clone(&self.table)))
            }
        }
    }

    /// Builds and launches the worker for `wiring`.
    pub async fn spawn(&self, wiring: Wiring) -> Result<WorkerHandle, RuntimeError> {
        let layout = wiring.to_string();
        self.launch(self.build(wiring), layout).await
    }

    /// Launches an already-built worker in its own task.
    pub async fn launch(
        &self,
        worker: Box<dyn Worker>,
        layout: impl Into<String>,
    ) -> Result<WorkerHandle, RuntimeError> {
        let role = worker.role();
        let layout: String = layout.into();
        let runtime = Handle::try_current().map_err(|e| RuntimeError::SpawnFailed {
            role,
            reason: e.to_string(),
        })?;

        let id = WorkerId::next();
        let token = CancellationToken::new();
        self.table.register(id, role, token.clone()).await;

        let join = runtime.spawn(runner::run_worker(
            worker,
            id,
            token,
            self.bus.clone(),
            self.cfg.log_dir.clone(),
        ));

        self.bus.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_role(role)
                .with_worker(id)
                .with_reason(layout),
        );
        Ok(WorkerHandle { role, id, join })
    }

    /// Spawns the whole topology in role order and supervises it.
    pub async fn run(&self, topology: Topology) -> Result<TopologyReport, RuntimeError> {
        let (wirings, control) = topology.into_parts();
        let mut handles = Vec::with_capacity(wirings.len());
        for wiring in wirings {
            match self.spawn(wiring).await {
                Ok(h) => handles.push(h),
                Err(e) => {
                    self.abandon(handles).await;
                    return Err(e);
                }
            }
        }
        self.supervise(handles, control).await
    }

    /// Waits for the first exit, then tears everything else down.
    pub async fn supervise(
        &self,
        mut handles: Vec<WorkerHandle>,
        control: SupervisorControl,
    ) -> Result<TopologyReport, RuntimeError> {
        if handles.is_empty() {
            return Err(RuntimeError::EmptyTopology);
        }

        let forwarder = self
            .cfg
            .handle_os_signals
            .then(|| self.forward_stop_signals(control));

        let first = Self::await_any_exit(&mut handles).await;
        if let Some(f) = forwarder {
            f.abort();
        }
        let Some(first) = first else {
            return Err(RuntimeError::EmptyTopology);
        };
        self.report_panic(&first);

        let origin = self.teardown_origin(&first).await;
        let spared: Vec<WorkerId> = std::iter::once(first.id).chain(origin).collect();
        self.terminate_others(&handles, &spared).await;
        let others = self.wait_with_grace(handles).await?;

        if let ExitStatus::Panicked(info) = &first.status {
            return Err(RuntimeError::WorkerPanicked {
                role: first.role,
                info: info.clone(),
            });
        }
        Ok(Self::attribute(first, others, origin))
    }

    /// Peer whose terminate request ended `first`, if it did not stop on its own.
    async fn teardown_origin(&self, first: &WorkerExitRecord) -> Option<WorkerId> {
        if !matches!(first.status, ExitStatus::Failed(WorkerError::Terminated)) {
            return None;
        }
        self.table
            .requested_by(first.id)
            .await
            .filter(|origin| *origin != first.id)
    }

    /// Puts the origin's exit at the front of the report.
    fn attribute(
        first: WorkerExitRecord,
        mut others: Vec<WorkerExitRecord>,
        origin: Option<WorkerId>,
    ) -> TopologyReport {
        let Some(idx) = origin.and_then(|o| others.iter().position(|r| r.id == o)) else {
            return TopologyReport { first, others };
        };
        let origin = others.remove(idx);
        tracing::debug!(role = %origin.role, "teardown started by a worker");
        others.insert(0, first);
        TopologyReport {
            first: origin,
            others,
        }
    }

    /// Waits until one tracked worker finishes and removes it from `handles`.
    ///
    /// Returns `None` if there is nothing to wait for. Cancel-safe: if the returned
    /// future is dropped, no handle is removed.
    pub async fn await_any_exit(handles: &mut Vec<WorkerHandle>) -> Option<WorkerExitRecord> {
        if handles.is_empty() {
            return None;
        }
        let (res, idx, _) = select_all(handles.iter_mut().map(|h| &mut h.join)).await;
        let h = handles.remove(idx);
        Some(WorkerExitRecord {
            role: h.role,
            id: h.id,
            status: ExitStatus::from_join(res),
        })
    }

    /// Sends a terminate request to every handle not in `spared`.
    ///
    /// Returns how many requests were actually delivered; workers already asked
    /// (e.g. by the supervisor's own fan-out) are skipped. A spared worker that is
    /// still running is left to finish its own teardown within the grace period.
    pub async fn terminate_others(&self, handles: &[WorkerHandle], spared: &[WorkerId]) -> usize {
        let mut delivered = 0;
        for h in handles.iter().filter(|h| !spared.contains(&h.id)) {
            if self.table.request_terminate(h.id).await {
                delivered += 1;
            }
        }
        delivered
    }

    async fn wait_with_grace(
        &self,
        mut handles: Vec<WorkerHandle>,
    ) -> Result<Vec<WorkerExitRecord>, RuntimeError> {
        let grace = self.cfg.grace;
        let deadline = Instant::now() + grace;
        let mut records = Vec::with_capacity(handles.len());

        loop {
            match time::timeout_at(deadline, Self::await_any_exit(&mut handles)).await {
                Ok(Some(record)) => {
                    self.report_panic(&record);
                    records.push(record);
                }
                Ok(None) => break,
                Err(_) => {
                    let stuck: Vec<Role> = handles.iter().map(|h| h.role).collect();
                    for h in &handles {
                        h.join.abort();
                    }
                    self.bus.publish(
                        Event::new(EventKind::GraceExceeded).with_reason(format!("{stuck:?}")),
                    );
                    return Err(RuntimeError::GraceExceeded { grace, stuck });
                }
            }
        }

        self.bus.publish(Event::new(EventKind::AllStoppedWithin));
        Ok(records)
    }

    /// Aborts workers spawned before a failed spawn.
    async fn abandon(&self, handles: Vec<WorkerHandle>) {
        for h in handles {
            self.table.request_terminate(h.id).await;
            h.join.abort();
        }
    }

    /// Publishes `WorkerExited` for panics; returned workers publish it themselves.
    fn report_panic(&self, record: &WorkerExitRecord) {
        if let ExitStatus::Panicked(info) = &record.status {
            self.bus.publish(
                Event::new(EventKind::WorkerExited)
                    .with_role(record.role)
                    .with_worker(record.id)
                    .with_exit_code(record.status.code())
                    .with_reason(format!("panicked: {info}")),
            );
        }
    }

    fn forward_stop_signals(&self, control: SupervisorControl) -> JoinHandle<()> {
        let bus = self.bus.clone();
        tokio::spawn(async move {
            match shutdown::termination_signal().await {
                Ok(signal) => {
                    bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(signal));
                    if !control.request_stop().await {
                        tracing::warn!("stop requested but the supervisor is gone");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "cannot listen for termination signals"),
            }
        })
    }
}
