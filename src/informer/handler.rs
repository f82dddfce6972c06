use std::fmt;
use std::sync::Arc;

use super::Object;
use super::WatchEvent;

/// Reaction to informer events.
///
/// Handlers are invoked serially with respect to the informer feeding them
/// and must not block: queue work elsewhere. Failure isolation is the
/// handler's own business, panics propagate into the dispatching task.
///
/// An `Add` may be delivered for a key the handler already knows (a live
/// event racing the initial replay), so `on_add` must be idempotent.
pub trait EventHandler<T>: Send + Sync + 'static {
    fn on_add(
        &self,
        item: &Arc<T>,
        is_initial_list: bool,
    );

    fn on_update(
        &self,
        old: &Arc<T>,
        new: &Arc<T>,
    );

    fn on_delete(
        &self,
        item: &Arc<T>,
    );

    fn handle(
        &self,
        event: &WatchEvent<T>,
    ) {
        match event {
            WatchEvent::Add { item, is_initial_list } => self.on_add(item, *is_initial_list),
            WatchEvent::Update { old, new } => self.on_update(old, new),
            WatchEvent::Delete { item } => self.on_delete(item),
        }
    }
}

type AddFn<T> = Box<dyn Fn(&Arc<T>, bool) + Send + Sync>;
type UpdateFn<T> = Box<dyn Fn(&Arc<T>, &Arc<T>) + Send + Sync>;
type DeleteFn<T> = Box<dyn Fn(&Arc<T>) + Send + Sync>;

/// Handler assembled from closures; unset callbacks ignore their event.
pub struct EventHandlerFns<T> {
    add: Option<AddFn<T>>,
    update: Option<UpdateFn<T>>,
    delete: Option<DeleteFn<T>>,
}

impl<T> Default for EventHandlerFns<T> {
    fn default() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }
}

impl<T> fmt::Debug for EventHandlerFns<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventHandlerFns")
            .field("add", &self.add.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl<T: Object> EventHandlerFns<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_add(
        mut self,
        f: impl Fn(&Arc<T>, bool) + Send + Sync + 'static,
    ) -> Self {
        self.add = Some(Box::new(f));
        self
    }

    pub fn on_update(
        mut self,
        f: impl Fn(&Arc<T>, &Arc<T>) + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn on_delete(
        mut self,
        f: impl Fn(&Arc<T>) + Send + Sync + 'static,
    ) -> Self {
        self.delete = Some(Box::new(f));
        self
    }
}

impl<T: Object> EventHandler<T> for EventHandlerFns<T> {
    fn on_add(
        &self,
        item: &Arc<T>,
        is_initial_list: bool,
    ) {
        if let Some(f) = &self.add {
            f(item, is_initial_list);
        }
    }

    fn on_update(
        &self,
        old: &Arc<T>,
        new: &Arc<T>,
    ) {
        if let Some(f) = &self.update {
            f(old, new);
        }
    }

    fn on_delete(
        &self,
        item: &Arc<T>,
    ) {
        if let Some(f) = &self.delete {
            f(item);
        }
    }
}

/// Forwards only items accepted by `filter`.
///
/// An update that moves an item into the filter reaches the inner handler as
/// an add, one that moves it out as a delete.
pub struct FilteringHandler<T> {
    filter: Box<dyn Fn(&T) -> bool + Send + Sync>,
    inner: Arc<dyn EventHandler<T>>,
}

impl<T: Object> FilteringHandler<T> {
    pub fn new(
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
        inner: Arc<dyn EventHandler<T>>,
    ) -> Self {
        Self {
            filter: Box::new(filter),
            inner,
        }
    }
}

impl<T: Object> EventHandler<T> for FilteringHandler<T> {
    fn on_add(
        &self,
        item: &Arc<T>,
        is_initial_list: bool,
    ) {
        if (self.filter)(item.as_ref()) {
            self.inner.on_add(item, is_initial_list);
        }
    }

    fn on_update(
        &self,
        old: &Arc<T>,
        new: &Arc<T>,
    ) {
        match ((self.filter)(old.as_ref()), (self.filter)(new.as_ref())) {
            (true, true) => self.inner.on_update(old, new),
            (true, false) => self.inner.on_delete(old),
            (false, true) => self.inner.on_add(new, false),
            (false, false) => {}
        }
    }

    fn on_delete(
        &self,
        item: &Arc<T>,
    ) {
        if (self.filter)(item.as_ref()) {
            self.inner.on_delete(item);
        }
    }
}
