use std::sync::Arc;

/// Event delivered to handlers.
///
/// `Add` with `is_initial_list = true` is a synthetic event for an item that
/// already existed when the handler was registered (or when the informer
/// performed its first list).
#[derive(Debug)]
pub enum WatchEvent<T> {
    Add { item: Arc<T>, is_initial_list: bool },
    Update { old: Arc<T>, new: Arc<T> },
    Delete { item: Arc<T> },
}

// Manual impl: `Arc<T>` is cloneable even when `T` is not
impl<T> Clone for WatchEvent<T> {
    fn clone(&self) -> Self {
        match self {
            WatchEvent::Add { item, is_initial_list } => WatchEvent::Add {
                item: item.clone(),
                is_initial_list: *is_initial_list,
            },
            WatchEvent::Update { old, new } => WatchEvent::Update {
                old: old.clone(),
                new: new.clone(),
            },
            WatchEvent::Delete { item } => WatchEvent::Delete { item: item.clone() },
        }
    }
}

impl<T> WatchEvent<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            WatchEvent::Add { .. } => "add",
            WatchEvent::Update { .. } => "update",
            WatchEvent::Delete { .. } => "delete",
        }
    }
}

/// Event as emitted by a watch stream, before the informer has related it
/// to its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
}

/// Result of a full list
#[derive(Debug, Clone)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    /// Opaque version a subsequent watch resumes from
    pub resource_version: String,
}
