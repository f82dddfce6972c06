//! Informer plumbing for a cluster connector.
//!
//! One [`SharedInformer`] per watched resource feeds any number of
//! short-lived handlers through a [`DynamicInformer`]. A [`HeartbeatBarrier`]
//! keeps checking that every informer of a connection has synced and reports
//! the outcome, and a [`ClusterController`] ties both together for one
//! provider cluster.
mod barrier;
mod cluster;
mod config;
mod dynamic;
mod errors;
mod informer;
pub(crate) mod utils;

pub use barrier::*;
pub use cluster::*;
pub use config::*;
pub use dynamic::*;
pub use errors::*;
pub use informer::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
