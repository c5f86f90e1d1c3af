//! Error types used by the dronevisor runtime and its workers.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`]: errors raised by the orchestrator itself.
//! - [`WorkerError`]: errors that end one worker (and therefore the topology).
//! - [`StoreError`]: failures creating or attaching the named position store.
//!
//! All types provide `as_label` for logs; [`WorkerError`] also maps to a process-style exit code.

use std::time::Duration;
use thiserror::Error;

use crate::topology::Role;

/// # Errors produced by the orchestrator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The spawn primitive was unavailable; the topology cannot be built.
    #[error("failed to spawn {role}: {reason}")]
    SpawnFailed {
        /// Role that could not be spawned.
        role: Role,
        /// Underlying reason.
        reason: String,
    },

    /// No worker was handed to the orchestrator.
    #[error("topology is empty")]
    EmptyTopology,

    /// The first worker to exit did so by panicking.
    #[error("{role} panicked: {info}")]
    WorkerPanicked {
        /// Role whose task panicked.
        role: Role,
        /// Panic payload, if it was a string.
        info: String,
    },

    /// Teardown grace period was exceeded; the listed roles were aborted.
    #[error("teardown grace {grace:?} exceeded; aborted: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Roles that did not exit in time.
        stuck: Vec<Role>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use dronevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(2), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::SpawnFailed { .. } => "runtime_spawn_failed",
            RuntimeError::EmptyTopology => "runtime_empty_topology",
            RuntimeError::WorkerPanicked { .. } => "runtime_worker_panicked",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors that terminate a worker.
///
/// None of these are retried: a worker returning any of them exits, and its exit
/// cascades into a teardown of the whole topology.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Resource creation, attach, or log setup failed.
    #[error("setup failed: {reason}")]
    Setup {
        /// The underlying error message.
        reason: String,
    },

    /// A send/receive primitive failed for a reason other than "no data yet".
    #[error("communication failed: {reason}")]
    Communication {
        /// The underlying error message.
        reason: String,
    },

    /// A monitored role never completed its handshake within the bootstrap bound.
    #[error("handshake from {role} not received within {timeout:?}")]
    HandshakeTimeout {
        /// Role whose identity never arrived.
        role: Role,
        /// The configured bound.
        timeout: Duration,
    },

    /// The supervisor declared these roles dead.
    #[error("liveness threshold exceeded by {roles:?}")]
    LivenessFailure {
        /// Roles whose counters exceeded the threshold in the same round.
        roles: Vec<Role>,
    },

    /// The supervisor stopped the topology on an operator request.
    #[error("external stop requested")]
    ExternalStop,

    /// The worker received a terminate request.
    #[error("terminated on request")]
    Terminated,
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use dronevisor::WorkerError;
    ///
    /// let err = WorkerError::Communication { reason: "closed".into() };
    /// assert_eq!(err.as_label(), "worker_communication");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Setup { .. } => "worker_setup",
            WorkerError::Communication { .. } => "worker_communication",
            WorkerError::HandshakeTimeout { .. } => "worker_handshake_timeout",
            WorkerError::LivenessFailure { .. } => "worker_liveness_failure",
            WorkerError::ExternalStop => "worker_external_stop",
            WorkerError::Terminated => "worker_terminated",
        }
    }

    /// Exit code reported for this failure. Every worker error is non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Terminated => 143,
            _ => 1,
        }
    }

    /// Shorthand for [`WorkerError::Setup`].
    pub(crate) fn setup(reason: impl Into<String>) -> Self {
        WorkerError::Setup {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`WorkerError::Communication`].
    pub(crate) fn communication(reason: impl Into<String>) -> Self {
        WorkerError::Communication {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by the named position store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A store with this name is still linked (e.g. left over by a crashed run).
    #[error("store {name:?} already exists")]
    AlreadyExists {
        /// Store name.
        name: String,
    },

    /// No store with this name was published before the wait elapsed.
    #[error("store {name:?} not found after {waited:?}")]
    NotFound {
        /// Store name.
        name: String,
        /// How long the attach waited.
        waited: Duration,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::AlreadyExists { .. } => "store_already_exists",
            StoreError::NotFound { .. } => "store_not_found",
        }
    }
}

impl From<StoreError> for WorkerError {
    fn from(err: StoreError) -> Self {
        WorkerError::setup(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_worker_error_is_non_zero() {
        let errors = [
            WorkerError::setup("x"),
            WorkerError::communication("x"),
            WorkerError::LivenessFailure {
                roles: vec![Role::Physics],
            },
            WorkerError::ExternalStop,
            WorkerError::Terminated,
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{}", err.as_label());
        }
    }

    #[test]
    fn store_errors_become_setup_failures() {
        let err: WorkerError = StoreError::AlreadyExists {
            name: "/drone_position".into(),
        }
        .into();
        assert_eq!(err.as_label(), "worker_setup");
        assert!(err.to_string().contains("already exists"));
    }
}
