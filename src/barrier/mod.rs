//! Synchronized startup of a cluster connection.
mod heartbeat_barrier;

pub use heartbeat_barrier::*;
