//! Input router: turns keystrokes into force vectors for physics.
//!
//! ```text
//!  w e r        (-1,-1) ( 0,-1) (+1,-1)
//!  s d f   →    (-1, 0)  stop   (+1, 0)
//!  x c v        (-1,+1) ( 0,+1) (+1,+1)
//! ```
//!
//! Each key nudges the current force by its delta, clamped to `{-1, 0, 1}` per
//! axis; `d` resets it. Unknown keys leave the force unchanged but are still
//! forwarded and logged.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::WorkerError;
use crate::state::ForceVector;
use crate::topology::{InputRouterWiring, MonitorEndpoints, Role};
use crate::workers::{Worker, WorkerContext, WorkerExit, QUIT_KEY};

/// Applies one key to the current force.
pub fn apply_key(force: ForceVector, key: char) -> ForceVector {
    let (dx, dy) = match key {
        'd' => return ForceVector::ZERO,
        'w' => (-1, -1),
        'e' => (0, -1),
        'r' => (1, -1),
        's' => (-1, 0),
        'f' => (1, 0),
        'x' => (-1, 1),
        'c' => (0, 1),
        'v' => (1, 1),
        _ => (0, 0),
    };
    force.nudged(dx, dy)
}

pub struct InputRouter {
    keys_in: mpsc::Receiver<char>,
    force_out: watch::Sender<ForceVector>,
    force: ForceVector,
    monitor: Option<MonitorEndpoints>,
}

impl InputRouter {
    pub fn new(wiring: InputRouterWiring) -> Self {
        Self {
            keys_in: wiring.keys_in,
            force_out: wiring.force_out,
            force: ForceVector::ZERO,
            monitor: Some(wiring.monitor),
        }
    }
}

#[async_trait]
impl Worker for InputRouter {
    fn role(&self) -> Role {
        Role::InputRouter
    }

    fn take_monitor(&mut self) -> Option<MonitorEndpoints> {
        self.monitor.take()
    }

    async fn run(&mut self, ctx: &mut WorkerContext) -> Result<WorkerExit, WorkerError> {
        let token = ctx.token.clone();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WorkerError::Terminated),
                probe = ctx.next_probe() => ctx.acknowledge(probe),
                key = self.keys_in.recv() => {
                    let Some(key) = key else {
                        return Err(WorkerError::communication("key channel from display closed"));
                    };
                    if key == QUIT_KEY {
                        return Ok(WorkerExit::Quit);
                    }

                    self.force = apply_key(self.force, key);
                    // Every key is re-sent, even when the force did not change.
                    self.force_out.send_replace(self.force);
                    if self.force_out.is_closed() {
                        return Err(WorkerError::communication("force channel to physics closed"));
                    }
                    ctx.audit
                        .record(format!("Key Press: {key}, Force Direction: {}", self.force))
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_nudge_and_clamp() {
        let f = apply_key(ForceVector::ZERO, 'f');
        assert_eq!(f, ForceVector::new(1, 0));
        let f = apply_key(f, 'f');
        assert_eq!(f, ForceVector::new(1, 0));
        let f = apply_key(f, 'w');
        assert_eq!(f, ForceVector::new(0, -1));
        let f = apply_key(f, 'e');
        assert_eq!(f, ForceVector::new(0, -1));
        let f = apply_key(f, 'v');
        assert_eq!(f, ForceVector::new(1, 0));
    }

    #[test]
    fn stop_resets_and_unknown_keys_keep_the_force() {
        let moving = ForceVector::new(-1, 1);
        assert_eq!(apply_key(moving, 'd'), ForceVector::ZERO);
        assert_eq!(apply_key(moving, 'z'), moving);
        assert_eq!(apply_key(moving, 'x'), moving);
        assert_eq!(apply_key(moving, 'r'), ForceVector::new(0, 0));
    }

    #[test]
    fn compass_grid_from_rest() {
        let expect = [
            ('w', (-1, -1)),
            ('e', (0, -1)),
            ('r', (1, -1)),
            ('s', (-1, 0)),
            ('f', (1, 0)),
            ('x', (-1, 1)),
            ('c', (0, 1)),
            ('v', (1, 1)),
        ];
        for (key, (x, y)) in expect {
            assert_eq!(apply_key(ForceVector::ZERO, key), ForceVector::new(x, y), "key {key}");
        }
    }
}
