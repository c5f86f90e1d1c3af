//! # Per-subscriber lanes for runtime events.
//!
//! [`SubscriberSet`] gives every subscriber its own bounded lane and task, so the
//! bus listener hands events over with `try_send` and never waits on a subscriber.
//!
//! ```text
//! emit(event) ──┬──► lane "log"      ──► LogWriter::on_event
//!               └──► lane "<custom>" ──► on_event ── panic ──► SubscriberPanicked
//! ```
//!
//! A full or closed lane loses that one event and reports `SubscriberOverflow`
//! (an overflow report that overflows is not reported again). Within a lane,
//! events keep publish order; across lanes there is no ordering.
//!
//! Panics are caught with `AssertUnwindSafe`, so a subscriber that panics while
//! holding a lock may leave that lock's data half-updated.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
    task: JoinHandle<()>,
}

impl Lane {
    fn open(sub: Arc<dyn Subscribe>, bus: Bus) -> Self {
        let name = sub.name();
        let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

        let task = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                    .catch_unwind()
                    .await;
                if let Err(payload) = handled {
                    bus.publish(Event::subscriber_panicked(name, panic_message(&*payload)));
                }
            }
        });
        Self { name, tx, task }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Fan-out of bus events to independent subscribers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    bus: Bus,
}

impl SubscriberSet {
    /// Opens one lane per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let lanes = subs
            .into_iter()
            .map(|sub| Lane::open(sub, bus.clone()))
            .collect();
        Self { lanes, bus }
    }

    /// Queues `event` on every lane without waiting.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        let report = event.kind != EventKind::SubscriberOverflow;

        for lane in &self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes every lane and waits until each subscriber has handled what it was sent.
    pub async fn shutdown(self) {
        let mut tasks = Vec::with_capacity(self.lanes.len());
        for lane in self.lanes {
            drop(lane.tx);
            tasks.push(lane.task);
        }
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "subscriber lane ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

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

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    /// Blocks forever on the first event it handles.
    #[derive(Default)]
    struct Tiny {
        busy: tokio::sync::Notify,
    }

    #[async_trait]
    impl Subscribe for Tiny {
        async fn on_event(&self, _event: &Event) {
            self.busy.notify_one();
            std::future::pending::<()>().await;
        }

        fn name(&self) -> &'static str {
            "tiny"
        }

        fn queue_capacity(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_starve_others() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let recorder = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![Arc::new(Exploding), recorder.clone()], bus);

        set.emit(&Event::new(EventKind::WorkerSpawned));
        set.emit(&Event::new(EventKind::WorkerExited));
        set.shutdown().await;

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![EventKind::WorkerSpawned, EventKind::WorkerExited]
        );
        let reported = rx.recv().await.unwrap();
        assert_eq!(reported.kind, EventKind::SubscriberPanicked);
        assert!(reported.reason.unwrap().contains("exploding"));
    }

    #[tokio::test]
    async fn full_lane_reports_overflow_once_per_event() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let tiny = Arc::new(Tiny::default());
        let set = SubscriberSet::new(vec![tiny.clone() as Arc<dyn Subscribe>], bus);

        // The lane task holds the first event forever; capacity 1 takes the second.
        set.emit(&Event::new(EventKind::WorkerSpawned));
        tiny.busy.notified().await;
        set.emit(&Event::new(EventKind::WorkerSpawned));
        set.emit(&Event::new(EventKind::WorkerExited));
        set.emit(&Event::subscriber_overflow("tiny", "full"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert!(rx.try_recv().is_err());
    }
}
