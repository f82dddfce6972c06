use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::ReentrantMutex;
use parking_lot::RwLock;
use tokio::time::interval_at;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::EventHandler;
use super::ListerWatcher;
use super::Object;
use super::RawEvent;
use super::Store;
use super::WatchEvent;
use crate::BackoffPolicy;
use crate::InformerError;
use crate::Result;
use crate::TaskError;

/// Opaque handle returned by [`Informer::add_event_handler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRegistration {
    id: u64,
}

impl HandlerRegistration {
    /// For [`Informer`] implementations; ids only need to be unique per
    /// informer.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Read side of a running informer.
///
/// This is the capability the multiplexer and the startup barrier need from
/// a watched source: its cache, its sync status, and a way to subscribe.
pub trait Informer<T: Object>: Send + Sync {
    /// Name of the watched resource, for logs and sync reports
    fn resource(&self) -> &str;

    fn store(&self) -> &Store<T>;

    /// True once the first full list has been stored and delivered
    fn has_synced(&self) -> bool;

    /// Registers a handler for the lifetime of the informer. If the informer
    /// already holds items they are replayed as `Add(is_initial_list = true)`.
    fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Result<HandlerRegistration>;

    /// Returns false if the registration was already gone.
    fn remove_event_handler(
        &self,
        registration: HandlerRegistration,
    ) -> bool;
}

/// Informer driving one [`ListerWatcher`]: list, watch, relist on stream
/// loss, periodic resync. Handlers are invoked serially from the `run` task
/// in the order the watch emits events.
///
/// Registration and delivery exclude each other: a handler added while a
/// batch is being delivered, from another thread or from inside one of the
/// batch's callbacks, gets the whole store replayed and none of the rest of
/// that batch.
pub struct SharedInformer<T: Object> {
    resource: String,
    lister_watcher: Arc<dyn ListerWatcher<T>>,
    store: Store<T>,

    handlers: RwLock<Vec<(HandlerRegistration, Arc<dyn EventHandler<T>>)>>,
    // held across store mutation and delivery; reentrant so handlers may
    // register from their callbacks
    delivery: ReentrantMutex<()>,
    next_handler_id: AtomicU64,

    started: AtomicBool,
    synced: AtomicBool,

    resync_period: Option<Duration>,
    relist_policy: BackoffPolicy,
}

impl<T: Object> fmt::Debug for SharedInformer<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SharedInformer")
            .field("resource", &self.resource)
            .field("store", &self.store)
            .field("handlers", &self.handlers.read().len())
            .field("synced", &self.has_synced())
            .finish_non_exhaustive()
    }
}

impl<T: Object> SharedInformer<T> {
    pub fn new(
        resource: impl Into<String>,
        lister_watcher: Arc<dyn ListerWatcher<T>>,
        resync_period: Option<Duration>,
        relist_policy: BackoffPolicy,
    ) -> Self {
        Self {
            resource: resource.into(),
            lister_watcher,
            store: Store::new(),
            handlers: RwLock::new(Vec::new()),
            delivery: ReentrantMutex::new(()),
            next_handler_id: AtomicU64::new(0),
            started: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            resync_period,
            relist_policy,
        }
    }

    /// Runs list/watch until `shutdown` is cancelled.
    ///
    /// Fails only when called twice or when a bounded relist policy is
    /// exhausted; transient list/watch failures are retried.
    pub async fn run(
        &self,
        shutdown: CancellationToken,
    ) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(InformerError::AlreadyStarted(self.resource.clone()).into());
        }
        info!(resource = %self.resource, "Starting informer");

        let mut resync = self.resync_period.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut failures: u32 = 0;

        loop {
            if failures > 0 {
                if self.relist_policy.max_retries > 0 && failures as usize > self.relist_policy.max_retries {
                    return Err(TaskError::RetryExhausted(format!(
                        "informer for {} gave up after {} failed list/watch attempts",
                        self.resource, failures
                    ))
                    .into());
                }
                let delay = self.relist_policy.delay_for(failures - 1);
                debug!(resource = %self.resource, ?delay, failures, "Backing off before relist");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }

            // List
            let listed = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                r = timeout(self.relist_policy.timeout(), self.lister_watcher.list()) => r,
            };
            let list = match listed {
                Ok(Ok(list)) => list,
                Ok(Err(e)) => {
                    warn!(resource = %self.resource, error = %e, "List failed");
                    failures += 1;
                    continue;
                }
                Err(_) => {
                    warn!(resource = %self.resource, timeout = ?self.relist_policy.timeout(), "List timed out");
                    failures += 1;
                    continue;
                }
            };

            self.relisted(list.items);

            // Watch
            let watched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                r = self.lister_watcher.watch(&list.resource_version) => r,
            };
            let mut stream = match watched {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(resource = %self.resource, error = %e, "Watch failed");
                    failures += 1;
                    continue;
                }
            };

            let mut received = false;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!(resource = %self.resource, "Informer stopped");
                        return Ok(());
                    }
                    _ = next_resync(&mut resync) => {
                        self.resync();
                    }
                    next = stream.next() => match next {
                        Some(Ok(raw)) => {
                            received = true;
                            self.apply(raw);
                        }
                        Some(Err(e)) => {
                            warn!(resource = %self.resource, error = %e, "Watch stream failed, relisting");
                            failures += 1;
                            break;
                        }
                        None => {
                            debug!(resource = %self.resource, "Watch stream closed, relisting");
                            // an idle stream closing right away counts as a failure
                            failures = if received { 0 } else { failures + 1 };
                            break;
                        }
                    }
                }
            }
        }

        info!(resource = %self.resource, "Informer stopped");
        Ok(())
    }

    fn relisted(
        &self,
        items: Vec<T>,
    ) {
        let _delivery = self.delivery.lock();
        let initial = !self.has_synced();
        let events = self.store.replace(items.into_iter().map(Arc::new).collect(), initial);
        self.distribute(&events);
        if initial {
            self.synced.store(true, Ordering::Release);
            info!(resource = %self.resource, items = self.store.len(), "Informer synced");
        }
    }

    fn apply(
        &self,
        raw: RawEvent<T>,
    ) {
        let _delivery = self.delivery.lock();
        let event = match raw {
            RawEvent::Added(obj) | RawEvent::Modified(obj) => {
                let item = Arc::new(obj);
                match self.store.upsert(item.clone()) {
                    Some(old) => WatchEvent::Update { old, new: item },
                    None => WatchEvent::Add {
                        item,
                        is_initial_list: false,
                    },
                }
            }
            RawEvent::Deleted(obj) => {
                let key = obj.key();
                if self.store.delete(&key).is_none() {
                    trace!(resource = %self.resource, %key, "Delete for unknown key ignored");
                    return;
                }
                WatchEvent::Delete { item: Arc::new(obj) }
            }
        };
        trace!(resource = %self.resource, kind = event.kind(), "Watch event");
        self.distribute(std::slice::from_ref(&event));
    }

    fn resync(&self) {
        let _delivery = self.delivery.lock();
        let events: Vec<WatchEvent<T>> = self
            .store
            .list()
            .into_iter()
            .map(|item| WatchEvent::Update {
                old: item.clone(),
                new: item,
            })
            .collect();
        debug!(resource = %self.resource, items = events.len(), "Resync");
        self.distribute(&events);
    }

    /// Delivers a batch to the handlers registered when it started. Callers
    /// hold `delivery`.
    fn distribute(
        &self,
        events: &[WatchEvent<T>],
    ) {
        let handlers: Vec<Arc<dyn EventHandler<T>>> = self.handlers.read().iter().map(|(_, h)| h.clone()).collect();
        trace!(resource = %self.resource, events = events.len(), handlers = handlers.len(), "Distribute events");
        for event in events {
            for handler in &handlers {
                handler.handle(event);
            }
        }
    }
}

async fn next_resync(resync: &mut Option<Interval>) {
    match resync {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl<T: Object> Informer<T> for SharedInformer<T> {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn store(&self) -> &Store<T> {
        &self.store
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Result<HandlerRegistration> {
        let registration = HandlerRegistration {
            id: self.next_handler_id.fetch_add(1, Ordering::Relaxed),
        };
        let _delivery = self.delivery.lock();
        self.handlers.write().push((registration, handler.clone()));

        // Items stored before this registration would otherwise never reach it
        for item in self.store.list() {
            handler.on_add(&item, true);
        }
        Ok(registration)
    }

    fn remove_event_handler(
        &self,
        registration: HandlerRegistration,
    ) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(r, _)| *r != registration);
        handlers.len() != before
    }
}
