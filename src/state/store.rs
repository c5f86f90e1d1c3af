//! # Named, lock-guarded position store.
//!
//! A [`StoreNamespace`] plays the role of the OS-level name table: a store is
//! created once under a fixed name and every participant attaches to it by name.
//!
//! ## Lifecycle
//! ```text
//! Telemetry:  StoreOwner::create(ns, name)   lock held ─► publish name ─► init ─► release
//!                  │
//!                  └─ drop ──► unlink name (existing handles keep working)
//!
//! Display / Physics / Telemetry:
//!             PositionStore::attach(ns, name, wait) ─► read() / write()
//! ```
//!
//! ## Rules
//! - `read()` and `write()` each take the lock once; a reader never sees a mix of two writes.
//! - The lock is FIFO-fair, so a reader is at most one write behind.
//! - Only one steady-state writer exists by construction (physics, after display's bootstrap write).
//! - Creating a name that is still linked fails with [`StoreError::AlreadyExists`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::{self, Instant};

use crate::error::StoreError;
use crate::state::PositionState;

type Slot = Arc<AsyncMutex<PositionState>>;

#[derive(Default)]
struct NamespaceInner {
    slots: Mutex<HashMap<String, Slot>>,
    published: Notify,
}

/// Table of named stores shared by every worker of one topology.
#[derive(Clone, Default)]
pub struct StoreNamespace {
    inner: Arc<NamespaceInner>,
}

impl StoreNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a store is currently linked under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<Slot> {
        let slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots.get(name).cloned()
    }

    fn link(&self, name: &str, slot: Slot) -> Result<(), StoreError> {
        let mut slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(name) {
            return Err(StoreError::AlreadyExists {
                name: name.to_string(),
            });
        }
        slots.insert(name.to_string(), slot);
        drop(slots);
        self.inner.published.notify_waiters();
        Ok(())
    }

    fn unlink(&self, name: &str, slot: &Slot) {
        let mut slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slots.get(name).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(name);
        }
    }
}

/// Creator's guard over a named store; unlinks the name when dropped.
///
/// Dropping happens on every exit path of the owning worker: clean return,
/// error, terminate request, or abort after the teardown grace.
pub struct StoreOwner {
    namespace: StoreNamespace,
    name: Arc<str>,
    slot: Slot,
}

impl StoreOwner {
    /// Creates and links a zero-initialized store under `name`.
    ///
    /// The lock is held from before the name is linked until initialization is
    /// complete, so an early attacher blocks instead of reading a half-built slot.
    pub async fn create(namespace: &StoreNamespace, name: &str) -> Result<Self, StoreError> {
        let slot: Slot = Arc::new(AsyncMutex::new(PositionState::default()));
        let mut construction = Arc::clone(&slot).lock_owned().await;

        namespace.link(name, Arc::clone(&slot))?;
        *construction = PositionState::default();
        drop(construction);

        Ok(Self {
            namespace: namespace.clone(),
            name: name.into(),
            slot,
        })
    }

    /// Opens a client handle on the owned store.
    pub fn attach(&self) -> PositionStore {
        PositionStore {
            name: Arc::clone(&self.name),
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for StoreOwner {
    fn drop(&mut self) {
        self.namespace.unlink(&self.name, &self.slot);
    }
}

/// Client handle on a named store.
#[derive(Clone)]
pub struct PositionStore {
    name: Arc<str>,
    slot: Slot,
}

impl PositionStore {
    /// Attaches to an already-created store without re-initializing it.
    ///
    /// Waits up to `wait` for the creator to link the name; `Duration::ZERO` checks once.
    pub async fn attach(
        namespace: &StoreNamespace,
        name: &str,
        wait: Duration,
    ) -> Result<Self, StoreError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = namespace.inner.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(slot) = namespace.lookup(name) {
                return Ok(Self {
                    name: name.into(),
                    slot,
                });
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return Err(StoreError::NotFound {
                    name: name.to_string(),
                    waited: wait,
                });
            }
        }
    }

    /// Copies the whole window under the lock.
    pub async fn read(&self) -> PositionState {
        *self.slot.lock().await
    }

    /// Overwrites the whole window under the lock.
    pub async fn write(&self, state: PositionState) {
        *self.slot.lock().await = state;
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
