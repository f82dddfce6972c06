use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use konnector::EventHandler;
use konnector::ListResult;
use konnector::ListerWatcher;
use konnector::Object;
use konnector::RawEvent;
use konnector::Result;
use konnector::WatchStream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceExport {
    pub namespace: String,
    pub name: String,
    pub generation: u64,
}

impl ServiceExport {
    pub fn new(
        name: &str,
        generation: u64,
    ) -> Self {
        Self {
            namespace: "kube-bind".to_string(),
            name: name.to_string(),
            generation,
        }
    }
}

impl Object for ServiceExport {
    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type Sender = mpsc::UnboundedSender<Result<RawEvent<ServiceExport>>>;

/// Backing store answering lists from memory and feeding the latest watch
pub struct MemoryListerWatcher {
    items: Mutex<Vec<ServiceExport>>,
    list_delay: Duration,
    watch: Mutex<Option<Sender>>,
}

impl MemoryListerWatcher {
    pub fn new(
        items: Vec<ServiceExport>,
        list_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            list_delay,
            watch: Mutex::new(None),
        })
    }

    pub fn is_watching(&self) -> bool {
        self.watch.lock().is_some()
    }

    pub fn apply(
        &self,
        event: RawEvent<ServiceExport>,
    ) {
        let mut items = self.items.lock();
        match &event {
            RawEvent::Added(item) | RawEvent::Modified(item) => {
                items.retain(|i| i.name != item.name);
                items.push(item.clone());
            }
            RawEvent::Deleted(item) => items.retain(|i| i.name != item.name),
        }
        if let Some(tx) = &*self.watch.lock() {
            let _ = tx.send(Ok(event));
        }
    }
}

#[async_trait]
impl ListerWatcher<ServiceExport> for MemoryListerWatcher {
    async fn list(&self) -> Result<ListResult<ServiceExport>> {
        sleep(self.list_delay).await;
        Ok(ListResult {
            items: self.items.lock().clone(),
            resource_version: "1".to_string(),
        })
    }

    async fn watch(
        &self,
        _resource_version: &str,
    ) -> Result<WatchStream<ServiceExport>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.watch.lock() = Some(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Handler keeping the names it currently knows about, like a reconciler
/// queue would.
#[derive(Default)]
pub struct NameSet {
    names: Mutex<Vec<String>>,
    adds: Mutex<usize>,
}

impl NameSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self.names.lock().clone();
        names.sort();
        names
    }

    pub fn adds(&self) -> usize {
        *self.adds.lock()
    }
}

impl EventHandler<ServiceExport> for NameSet {
    fn on_add(
        &self,
        item: &Arc<ServiceExport>,
        _is_initial_list: bool,
    ) {
        *self.adds.lock() += 1;
        let mut names = self.names.lock();
        if !names.contains(&item.name) {
            names.push(item.name.clone());
        }
    }

    fn on_update(
        &self,
        _old: &Arc<ServiceExport>,
        _new: &Arc<ServiceExport>,
    ) {
    }

    fn on_delete(
        &self,
        item: &Arc<ServiceExport>,
    ) {
        self.names.lock().retain(|n| n != &item.name);
    }
}

pub async fn eventually(
    within: Duration,
    condition: impl Fn() -> bool,
) -> bool {
    let deadline = Instant::now() + within;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
    true
}
