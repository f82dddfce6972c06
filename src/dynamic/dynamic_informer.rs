use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::EventHandler;
use crate::HandlerRegistration;
use crate::Informer;
use crate::InformerError;
use crate::Object;
use crate::Result;
use crate::Store;

/// Unique key of a dynamic registration: the caller's name plus the value of
/// the per-informer counter at registration time. Rendered `name-epoch`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerKey {
    name: String,
    epoch: u64,
}

impl HandlerKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.epoch)
    }
}

struct Handlers<T> {
    by_key: BTreeMap<HandlerKey, Arc<dyn EventHandler<T>>>,
    counter: u64,
}

/// Handler mapping shared by the informer, its fan-out handler and the
/// per-registration cleanup tasks.
struct Registry<T> {
    handlers: RwLock<Handlers<T>>,
}

impl<T: Object> Registry<T> {
    fn insert(
        &self,
        name: &str,
        handler: Arc<dyn EventHandler<T>>,
    ) -> HandlerKey {
        let mut handlers = self.handlers.write();
        let key = HandlerKey {
            name: name.to_string(),
            epoch: handlers.counter,
        };
        handlers.counter += 1;
        handlers.by_key.insert(key.clone(), handler);
        key
    }

    fn remove(
        &self,
        key: &HandlerKey,
    ) -> bool {
        self.handlers.write().by_key.remove(key).is_some()
    }

    /// Calls `f` on a snapshot of the handlers, outside the lock.
    fn dispatch(
        &self,
        f: impl Fn(&dyn EventHandler<T>),
    ) {
        let snapshot: Vec<Arc<dyn EventHandler<T>>> = self.handlers.read().by_key.values().cloned().collect();
        for handler in snapshot {
            f(handler.as_ref());
        }
    }
}

/// The single static handler a [`DynamicInformer`] owns on its source
struct FanOut<T> {
    registry: Arc<Registry<T>>,
}

impl<T: Object> EventHandler<T> for FanOut<T> {
    fn on_add(
        &self,
        item: &Arc<T>,
        is_initial_list: bool,
    ) {
        self.registry.dispatch(|h| h.on_add(item, is_initial_list));
    }

    fn on_update(
        &self,
        old: &Arc<T>,
        new: &Arc<T>,
    ) {
        self.registry.dispatch(|h| h.on_update(old, new));
    }

    fn on_delete(
        &self,
        item: &Arc<T>,
    ) {
        self.registry.dispatch(|h| h.on_delete(item));
    }
}

/// Informer whose handlers come and go at runtime.
///
/// Wraps one source and subscribes to it exactly once; every event from that
/// subscription is re-broadcast to the handlers registered at dispatch time.
/// Handlers are added with [`DynamicInformer::add_dynamic_event_handler`] and
/// removed when the token they were registered with is cancelled. The static
/// [`Informer::add_event_handler`] path is rejected so that only one fan-out
/// mechanism ever exists per source.
///
/// # Delivery
///
/// - A handler sees every event dispatched after its registration returned.
///   Events dispatched while it registers may or may not reach it.
/// - A new handler first receives the source's current items as
///   `on_add(item, true)`. This replay is not atomic with live events, so an
///   item may be added twice; handlers must treat `on_add` idempotently.
/// - After removal no new dispatch starts for the handler; one dispatch that
///   had already taken its snapshot may still complete.
pub struct DynamicInformer<T: Object> {
    source: Arc<dyn Informer<T>>,
    registry: Arc<Registry<T>>,
    registration: HandlerRegistration,
    scope: CancellationToken,
}

impl<T: Object> fmt::Debug for DynamicInformer<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DynamicInformer")
            .field("resource", &self.source.resource())
            .field("handlers", &self.handler_keys())
            .field("stopped", &self.scope.is_cancelled())
            .finish()
    }
}

impl<T: Object> DynamicInformer<T> {
    /// Subscribes to `source`. Cancelling `scope` stops all dynamic
    /// registrations and rejects new ones.
    pub fn new(
        source: Arc<dyn Informer<T>>,
        scope: CancellationToken,
    ) -> Result<Self> {
        let registry = Arc::new(Registry {
            handlers: RwLock::new(Handlers {
                by_key: BTreeMap::new(),
                counter: 0,
            }),
        });
        let registration = source.add_event_handler(Arc::new(FanOut {
            registry: registry.clone(),
        }))?;

        Ok(Self {
            source,
            registry,
            registration,
            scope,
        })
    }

    /// Registers `handler` until `cancel` fires, then replays the current
    /// items to it.
    ///
    /// `name` does not need to be unique; the returned key is. Returns `None`
    /// without registering anything if the informer scope or `cancel` is
    /// already cancelled, or if called outside a tokio runtime.
    pub fn add_dynamic_event_handler(
        &self,
        cancel: CancellationToken,
        name: &str,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Option<HandlerKey> {
        if self.scope.is_cancelled() {
            warn!(resource = %self.source.resource(), handler = %name, "Dynamic informer stopped, handler not registered");
            return None;
        }
        if cancel.is_cancelled() {
            debug!(resource = %self.source.resource(), handler = %name, "Registration cancelled before it started");
            return None;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(resource = %self.source.resource(), handler = %name, "No tokio runtime, handler not registered");
            return None;
        };

        let key = self.registry.insert(name, handler.clone());
        debug!(resource = %self.source.resource(), handler = %key, "Dynamic handler registered");

        let registry = self.registry.clone();
        let scope = self.scope.clone();
        let resource = self.source.resource().to_string();
        let task_key = key.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = scope.cancelled() => {}
            }
            if registry.remove(&task_key) {
                debug!(%resource, handler = %task_key, "Dynamic handler removed");
            }
        });

        // Simulate the initial adds the handler missed by joining late
        let items = self.source.store().list();
        trace!(resource = %self.source.resource(), handler = %key, items = items.len(), "Replaying current items");
        for item in items {
            handler.on_add(&item, true);
        }

        Some(key)
    }

    pub fn handler_count(&self) -> usize {
        self.registry.handlers.read().by_key.len()
    }

    /// Live registration keys in dispatch order
    pub fn handler_keys(&self) -> Vec<HandlerKey> {
        self.registry.handlers.read().by_key.keys().cloned().collect()
    }
}

impl<T: Object> Informer<T> for DynamicInformer<T> {
    fn resource(&self) -> &str {
        self.source.resource()
    }

    fn store(&self) -> &Store<T> {
        self.source.store()
    }

    fn has_synced(&self) -> bool {
        self.source.has_synced()
    }

    fn add_event_handler(
        &self,
        _handler: Arc<dyn EventHandler<T>>,
    ) -> Result<HandlerRegistration> {
        Err(InformerError::StaticHandlerRejected.into())
    }

    fn remove_event_handler(
        &self,
        _registration: HandlerRegistration,
    ) -> bool {
        false
    }
}

impl<T: Object> Drop for DynamicInformer<T> {
    fn drop(&mut self) {
        self.source.remove_event_handler(self.registration);
    }
}
