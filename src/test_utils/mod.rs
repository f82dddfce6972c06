//! Fakes and helpers shared by the unit tests
mod common;
mod fake_lister_watcher;
mod objects;
mod recording_handler;

pub use common::*;
pub use fake_lister_watcher::*;
pub use objects::*;
pub use recording_handler::*;
