//! Shared drone state: position samples, the three-sample window, force vectors
//! and the named store that synchronizes the window between workers.

mod position;
mod store;

pub use position::{BOARD_SIZE, ForceVector, PositionSample, PositionState};
pub use store::{PositionStore, StoreNamespace, StoreOwner};
