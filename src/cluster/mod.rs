//! Per-connection wiring: readiness reporting on bindings and the controller
//! that starts everything for one provider cluster.
mod cluster_controller;
pub mod conditions;
mod status;

pub use cluster_controller::*;
pub use status::*;
