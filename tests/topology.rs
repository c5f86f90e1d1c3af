use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use dronevisor::{
    Config, Event, EventKind, ExitStatus, MonitorEndpoints, Orchestrator, PositionStore, Role,
    StoreNamespace, StoreOwner, Subscribe, TelemetryWiring, Wiring, Worker, WorkerContext,
    WorkerError, WorkerExit,
};

fn fast_config() -> Config {
    Config {
        probe_delay: Duration::from_millis(5),
        physics_period: Duration::from_millis(10),
        refresh_period: Duration::from_millis(20),
        log_dir: None,
        handle_os_signals: false,
        ..Config::default()
    }
}

fn is_terminated(status: &ExitStatus) -> bool {
    matches!(status, ExitStatus::Failed(WorkerError::Terminated))
}

fn setup_reason(status: &ExitStatus) -> Option<&str> {
    match status {
        ExitStatus::Failed(WorkerError::Setup { reason }) => Some(reason.as_str()),
        _ => None,
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.seen.lock().unwrap().push(event.kind);
    }
}

#[tokio::test(start_paused = true)]
async fn quit_key_tears_the_topology_down_cleanly() {
    let recorder = Arc::new(Recorder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
    let orchestrator = Orchestrator::new(fast_config(), subs);
    let (keys, feed) = mpsc::channel(8);
    keys.send('f').await.unwrap();
    keys.send('q').await.unwrap();

    let report = orchestrator
        .run(orchestrator.topology(Some(feed)))
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert!(matches!(report.first.role, Role::Display | Role::InputRouter));
    assert_eq!(report.others.len(), 4);
    for role in [Role::Telemetry, Role::Physics, Role::Supervisor] {
        let record = report.record(role).unwrap();
        assert!(is_terminated(&record.status), "{role}: {:?}", record.status);
    }
    assert!(!orchestrator.namespace().contains("/drone_position"));

    orchestrator.shutdown().await;
    let seen = recorder.seen.lock().unwrap();
    let spawned = seen.iter().filter(|k| **k == EventKind::WorkerSpawned).count();
    assert_eq!(spawned, 5);
    assert!(seen.contains(&EventKind::AllStoppedWithin));
}

#[tokio::test(start_paused = true)]
async fn force_moves_the_drone_until_an_external_stop() {
    let orchestrator = Orchestrator::new(fast_config(), Vec::new());
    let (keys, feed) = mpsc::channel(8);
    let topology = orchestrator.topology(Some(feed));
    let control = topology.control.clone();
    let namespace = orchestrator.namespace().clone();

    let observer = tokio::spawn(async move {
        keys.send('f').await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let store = PositionStore::attach(&namespace, "/drone_position", Duration::ZERO)
            .await
            .unwrap();
        let current = store.read().await.current();
        assert!(control.request_stop().await);
        (current, keys)
    });

    let report = orchestrator.run(topology).await.unwrap();
    let (current, _keys) = observer.await.unwrap();

    assert!(current.x() > 50.0, "drone did not move: {current}");
    assert_eq!(current.y(), 50.0);

    assert_eq!(report.first.role, Role::Supervisor);
    assert_eq!(report.exit_code(), 1);
    assert!(matches!(
        report.first.status,
        ExitStatus::Failed(WorkerError::ExternalStop)
    ));
    for role in [Role::Telemetry, Role::Display, Role::InputRouter, Role::Physics] {
        assert!(is_terminated(&report.record(role).unwrap().status), "{role}");
    }
}

/// Creates the store and reports its identity, then never answers a probe.
struct MuteTelemetry {
    namespace: StoreNamespace,
    monitor: Option<MonitorEndpoints>,
}

impl MuteTelemetry {
    fn new(namespace: StoreNamespace, wiring: TelemetryWiring) -> Self {
        Self {
            namespace,
            monitor: Some(wiring.monitor),
        }
    }
}

#[async_trait]
impl Worker for MuteTelemetry {
    fn role(&self) -> Role {
        Role::Telemetry
    }

    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        self.monitor.take()
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        let _owner = StoreOwner::create(&self.namespace, "/drone_position").await?;
        ctx.token.cancelled().await;
        Err(WorkerError::Terminated)
    }
}

#[tokio::test(start_paused = true)]
async fn unresponsive_role_is_declared_dead() {
    let orchestrator = Orchestrator::new(fast_config(), Vec::new());
    let (wirings, control) = orchestrator.topology(None).into_parts();

    let mut handles = Vec::new();
    for wiring in wirings {
        let handle = match wiring {
            Wiring::Telemetry(w) => {
                let mute = MuteTelemetry::new(orchestrator.namespace().clone(), w);
                orchestrator.launch(Box::new(mute), "mute").await
            }
            other => orchestrator.spawn(other).await,
        };
        handles.push(handle.unwrap());
    }

    let report = orchestrator.supervise(handles, control).await.unwrap();

    assert_eq!(report.first.role, Role::Supervisor);
    assert_eq!(report.exit_code(), 1);
    match &report.first.status {
        ExitStatus::Failed(WorkerError::LivenessFailure { roles }) => {
            assert_eq!(roles, &vec![Role::Telemetry]);
        }
        other => panic!("unexpected supervisor exit: {other:?}"),
    }
    for role in [Role::Telemetry, Role::Display, Role::InputRouter, Role::Physics] {
        assert!(is_terminated(&report.record(role).unwrap().status), "{role}");
    }
}

#[tokio::test]
async fn terminate_requests_are_delivered_once() {
    let orchestrator = Orchestrator::new(fast_config(), Vec::new());
    let table = orchestrator.process_table();
    let token = CancellationToken::new();
    let id = dronevisor::WorkerId::next();
    table.register(id, Role::Display, token.clone()).await;

    assert!(table.request_terminate(id).await);
    assert!(!table.request_terminate(id).await);
    assert!(token.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn taken_store_name_fails_telemetry_and_tears_down() {
    let orchestrator = Orchestrator::new(fast_config(), Vec::new());
    let _squatter = StoreOwner::create(orchestrator.namespace(), "/drone_position")
        .await
        .unwrap();

    let report = orchestrator
        .run(orchestrator.topology(None))
        .await
        .unwrap();

    assert_eq!(report.first.role, Role::Telemetry);
    assert_eq!(report.exit_code(), 1);
    let reason = setup_reason(&report.first.status).unwrap();
    assert!(reason.contains("already exists"), "{reason}");
    for role in [Role::Display, Role::InputRouter, Role::Physics, Role::Supervisor] {
        assert!(is_terminated(&report.record(role).unwrap().status), "{role}");
    }
    assert!(orchestrator.namespace().contains("/drone_position"));
}

/// Reports its identity and answers probes, but never publishes the store.
struct StorelessTelemetry {
    monitor: Option<MonitorEndpoints>,
}

#[async_trait]
impl Worker for StorelessTelemetry {
    fn role(&self) -> Role {
        Role::Telemetry
    }

    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        self.monitor.take()
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        loop {
            ctx.pause(Duration::from_secs(3600)).await?;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn missing_store_fails_an_attaching_role_and_tears_down() {
    let cfg = Config {
        attach_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let orchestrator = Orchestrator::new(cfg, Vec::new());
    let (wirings, control) = orchestrator.topology(None).into_parts();

    let mut handles = Vec::new();
    for wiring in wirings {
        let handle = match wiring {
            Wiring::Telemetry(w) => {
                let storeless = StorelessTelemetry {
                    monitor: Some(w.monitor),
                };
                orchestrator.launch(Box::new(storeless), "storeless").await
            }
            other => orchestrator.spawn(other).await,
        };
        handles.push(handle.unwrap());
    }

    let report = orchestrator.supervise(handles, control).await.unwrap();

    assert!(matches!(report.first.role, Role::Display | Role::Physics));
    assert_eq!(report.exit_code(), 1);
    let reason = setup_reason(&report.first.status).unwrap();
    assert!(reason.contains("not found"), "{reason}");
    for role in [Role::Telemetry, Role::InputRouter, Role::Supervisor] {
        assert!(is_terminated(&report.record(role).unwrap().status), "{role}");
    }
}
