//! Dynamic event handler registration on top of a shared informer.
//!
//! Many short-lived consumers (one per binding, per export, ...) want events
//! from the same watched resource. Instead of one informer each, they share a
//! single subscription through a [`DynamicInformer`] and come and go with
//! their own [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! ```ignore
//! let dynamic = DynamicInformer::new(informer, connection_token.clone())?;
//! let key = dynamic.add_dynamic_event_handler(
//!     binding_token.child_token(),
//!     "servicebinding",
//!     Arc::new(handler),
//! );
//! ```
mod dynamic_informer;

pub use dynamic_informer::*;
