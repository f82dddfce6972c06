use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::Informer;
use super::ListerWatcher;
use super::Object;
use super::SharedInformer;
use crate::utils::async_task::spawn_task;
use crate::BackoffPolicy;
use crate::InformerError;
use crate::KonnectorConfig;
use crate::Result;

/// Something the startup barrier can wait on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheSyncWaiter: Send + Sync + 'static {
    /// Name used in logs and sync reports
    fn name(&self) -> String;

    /// Polls until every tracked informer has synced or `cancel` fires, and
    /// returns the sync status per informer at that moment.
    async fn wait_for_cache_sync(
        &self,
        cancel: CancellationToken,
    ) -> HashMap<String, bool>;
}

/// Type-erased view the factory needs to drive an informer
trait RunnableInformer: Send + Sync {
    fn has_synced(&self) -> bool;

    fn run_boxed(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> BoxFuture<'static, Result<()>>;
}

impl<T: Object> RunnableInformer for SharedInformer<T> {
    fn has_synced(&self) -> bool {
        Informer::has_synced(self)
    }

    fn run_boxed(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { self.run(shutdown).await })
    }
}

struct FactoryEntry {
    item_type: &'static str,
    informer: Arc<dyn Any + Send + Sync>,
    runner: Arc<dyn RunnableInformer>,
    started: bool,
}

/// Owns the informers of one cluster connection, keyed by resource name.
///
/// Informers are created lazily by [`InformerFactory::informer_for`] and all
/// started together by [`InformerFactory::start`]; requesting the same
/// resource twice returns the same informer.
pub struct InformerFactory {
    name: String,
    informers: DashMap<String, FactoryEntry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,

    resync_period: Option<Duration>,
    relist_policy: BackoffPolicy,
    poll_interval: Duration,
}

impl fmt::Debug for InformerFactory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InformerFactory")
            .field("name", &self.name)
            .field("informers", &self.resources())
            .finish_non_exhaustive()
    }
}

impl InformerFactory {
    pub fn new(
        name: impl Into<String>,
        config: &KonnectorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            informers: DashMap::new(),
            tasks: Mutex::new(Vec::new()),
            resync_period: config.informer.resync_period(),
            relist_policy: config.retry.relist,
            poll_interval: config.heartbeat.cache_sync_poll_interval(),
        }
    }

    /// Returns the informer for `resource`, creating it with the lister-watcher
    /// built by `lister_watcher` on first use.
    pub fn informer_for<T, F>(
        &self,
        resource: &str,
        lister_watcher: F,
    ) -> Result<Arc<SharedInformer<T>>>
    where
        T: Object,
        F: FnOnce() -> Arc<dyn ListerWatcher<T>>,
    {
        let entry = self.informers.entry(resource.to_string()).or_insert_with(|| {
            let informer = Arc::new(SharedInformer::new(
                resource,
                lister_watcher(),
                self.resync_period,
                self.relist_policy,
            ));
            debug!(factory = %self.name, %resource, "Informer created");
            FactoryEntry {
                item_type: std::any::type_name::<T>(),
                informer: informer.clone(),
                runner: informer,
                started: false,
            }
        });

        entry.informer.clone().downcast::<SharedInformer<T>>().map_err(|_| {
            InformerError::ResourceTypeMismatch {
                resource: resource.to_string(),
                existing: entry.item_type,
            }
            .into()
        })
    }

    /// Spawns every informer not started yet. Safe to call repeatedly; later
    /// calls only pick up informers requested since.
    pub fn start(
        &self,
        shutdown: CancellationToken,
    ) {
        let mut tasks = self.tasks.lock();
        for mut entry in self.informers.iter_mut() {
            if entry.started {
                continue;
            }
            entry.started = true;

            let runner = entry.runner.clone();
            let token = shutdown.clone();
            let task_name = format!("{}/{}", self.name, entry.key());
            tasks.push(spawn_task(&task_name, move || runner.run_boxed(token)));
        }
        info!(factory = %self.name, informers = tasks.len(), "Informer factory started");
    }

    /// Waits for every spawned informer task to return. Call after
    /// cancelling the token given to [`InformerFactory::start`].
    pub async fn wait_stopped(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(factory = %self.name, error = %e, "Informer task did not finish cleanly");
            }
        }
    }

    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.informers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn sync_status(&self) -> HashMap<String, bool> {
        self.informers
            .iter()
            .filter(|e| e.started)
            .map(|e| (e.key().clone(), e.runner.has_synced()))
            .collect()
    }
}

#[async_trait]
impl CacheSyncWaiter for InformerFactory {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// Informers that were never started are not reported.
    async fn wait_for_cache_sync(
        &self,
        cancel: CancellationToken,
    ) -> HashMap<String, bool> {
        loop {
            let status = self.sync_status();
            if status.values().all(|synced| *synced) {
                return status;
            }
            tokio::select! {
                _ = cancel.cancelled() => return self.sync_status(),
                _ = sleep(self.poll_interval) => {}
            }
        }
    }
}
