use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::TestObject;
use crate::InformerError;
use crate::ListResult;
use crate::ListerWatcher;
use crate::RawEvent;
use crate::Result;
use crate::WatchStream;

type WatchSender = mpsc::UnboundedSender<Result<RawEvent<TestObject>>>;

/// In-memory backing store. Lists return the current items, the latest
/// watch stream is fed through [`FakeListerWatcher::send`].
#[derive(Debug, Default)]
pub struct FakeListerWatcher {
    items: Mutex<Vec<TestObject>>,
    list_delay: Mutex<Duration>,
    failing_lists: AtomicUsize,
    lists: AtomicUsize,
    watches: AtomicUsize,
    watch_tx: Mutex<Option<WatchSender>>,
}

impl FakeListerWatcher {
    pub fn new(items: Vec<TestObject>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            ..Default::default()
        })
    }

    pub fn set_items(
        &self,
        items: Vec<TestObject>,
    ) {
        *self.items.lock() = items;
    }

    /// Every list takes `delay` before answering
    pub fn set_list_delay(
        &self,
        delay: Duration,
    ) {
        *self.list_delay.lock() = delay;
    }

    /// The next `n` lists fail
    pub fn fail_next_lists(
        &self,
        n: usize,
    ) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn watch_calls(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }

    /// Pushes an event into the open watch. False if no watch is open.
    pub fn send(
        &self,
        event: RawEvent<TestObject>,
    ) -> bool {
        match &*self.watch_tx.lock() {
            Some(tx) => tx.send(Ok(event)).is_ok(),
            None => false,
        }
    }

    pub fn fail_watch(&self) -> bool {
        match self.watch_tx.lock().take() {
            Some(tx) => tx
                .send(Err(InformerError::Watch {
                    resource: "fake".to_string(),
                    source: "connection reset".into(),
                }
                .into()))
                .is_ok(),
            None => false,
        }
    }

    /// Ends the open watch stream
    pub fn close_watch(&self) {
        self.watch_tx.lock().take();
    }
}

#[async_trait]
impl ListerWatcher<TestObject> for FakeListerWatcher {
    async fn list(&self) -> Result<ListResult<TestObject>> {
        let call = self.lists.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.list_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let failing = self.failing_lists.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_lists.store(failing - 1, Ordering::SeqCst);
            return Err(InformerError::List {
                resource: "fake".to_string(),
                source: "backing store unavailable".into(),
            }
            .into());
        }

        Ok(ListResult {
            items: self.items.lock().clone(),
            resource_version: call.to_string(),
        })
    }

    async fn watch(
        &self,
        _resource_version: &str,
    ) -> Result<WatchStream<TestObject>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.watch_tx.lock() = Some(tx);
        self.watches.fetch_add(1, Ordering::SeqCst);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
