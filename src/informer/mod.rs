//! Watched resource sources.
//!
//! A [`SharedInformer`] keeps a [`Store`] in sync with a backing object store
//! through a [`ListerWatcher`] and tells registered [`EventHandler`]s about
//! every change. An [`InformerFactory`] groups the informers of one cluster
//! connection so they can be started and waited on together.
//!
//! ```text
//! ListerWatcher ──list/watch──▶ SharedInformer ──▶ Store
//!                                    │
//!                                    └──▶ EventHandler (static, or a DynamicInformer)
//! ```
mod event;
mod factory;
mod handler;
mod lister_watcher;
mod object;
mod shared_informer;
mod store;

pub use event::*;
pub use factory::*;
pub use handler::*;
pub use lister_watcher::*;
pub use object::*;
pub use shared_informer::*;
pub use store::*;

#[cfg(test)]
mod factory_test;
#[cfg(test)]
mod handler_test;
