//! # One-shot identity handshake.
//!
//! Every monitored worker reports its [`WorkerId`] to the supervisor exactly once,
//! right after it starts. The channel is consumed on both ends.
//!
//! ```text
//! worker ── HandshakeSender::report(id) ──► HandshakeReceiver::receive() ── supervisor
//! ```
//!
//! A worker that dies before reporting drops its sender; the supervisor then sees a
//! communication failure instead of waiting forever.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use crate::error::WorkerError;
use crate::topology::{Role, WorkerId};

/// Creates the handshake channel for one monitored role.
pub fn channel(role: Role) -> (HandshakeSender, HandshakeReceiver) {
    let (tx, rx) = oneshot::channel();
    (HandshakeSender { role, tx }, HandshakeReceiver { role, rx })
}

/// Worker side of the handshake.
#[derive(Debug)]
pub struct HandshakeSender {
    role: Role,
    tx: oneshot::Sender<WorkerId>,
}

impl HandshakeSender {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Sends the identity; fails if the supervisor side is gone.
    pub fn report(self, id: WorkerId) -> Result<(), WorkerError> {
        let role = self.role;
        self.tx.send(id).map_err(|_| {
            WorkerError::communication(format!("{role}: supervisor handshake endpoint closed"))
        })
    }
}

/// Supervisor side of the handshake.
#[derive(Debug)]
pub struct HandshakeReceiver {
    role: Role,
    rx: oneshot::Receiver<WorkerId>,
}

impl HandshakeReceiver {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Waits for the identity, optionally bounded.
    pub async fn receive(self, bound: Option<Duration>) -> Result<WorkerId, WorkerError> {
        let role = self.role;
        let received = match bound {
            Some(timeout) => time::timeout(timeout, self.rx)
                .await
                .map_err(|_| WorkerError::HandshakeTimeout { role, timeout })?,
            None => self.rx.await,
        };
        received.map_err(|_| {
            WorkerError::communication(format!("{role} exited before its handshake"))
        })
    }
}
