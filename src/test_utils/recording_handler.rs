use std::sync::Arc;

use parking_lot::Mutex;

use super::TestObject;
use crate::EventHandler;
use crate::Object;

/// What a [`RecordingHandler`] saw, by key and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Add { key: String, initial: bool },
    Update { key: String, old: u64, new: u64 },
    Delete { key: String },
}

pub fn add(
    key: &str,
    initial: bool,
) -> Seen {
    Seen::Add {
        key: key.to_string(),
        initial,
    }
}

pub fn update(
    key: &str,
    old: u64,
    new: u64,
) -> Seen {
    Seen::Update {
        key: key.to_string(),
        old,
        new,
    }
}

pub fn delete(key: &str) -> Seen {
    Seen::Delete { key: key.to_string() }
}

#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<Seen>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl EventHandler<TestObject> for RecordingHandler {
    fn on_add(
        &self,
        item: &Arc<TestObject>,
        is_initial_list: bool,
    ) {
        self.seen.lock().push(add(&item.key(), is_initial_list));
    }

    fn on_update(
        &self,
        old: &Arc<TestObject>,
        new: &Arc<TestObject>,
    ) {
        self.seen.lock().push(update(&new.key(), old.version, new.version));
    }

    fn on_delete(
        &self,
        item: &Arc<TestObject>,
    ) {
        self.seen.lock().push(delete(&item.key()));
    }
}
