//! Mutation events.
//!
//! - `change`: the values storage publishes after each committed write
//! - `bus`: ordered fan-out to listeners with per-listener failure isolation

mod bus;
mod change;

#[cfg(test)]
mod bus_test;

pub use bus::{ChangeListener, DispatchReport, ListenerError, ListenerGuard, ListenerId, MutationBus};
pub use change::{ChangeSet, VideoChange};
