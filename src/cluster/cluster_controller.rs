use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::conditions::Conditioned;
use super::BindingClient;
use super::BindingStatusReporter;
use crate::split_meta_namespace_key;
use crate::CacheSyncWaiter;
use crate::HeartbeatBarrier;
use crate::Informer;
use crate::InformerFactory;
use crate::KonnectorConfig;
use crate::Object;
use crate::ReadinessHook;
use crate::Result;

/// A controller that only starts once the connection's caches are synced
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenericController: Send + Sync + 'static {
    /// Runs with `workers` workers until `shutdown` is cancelled.
    async fn start(
        &self,
        shutdown: CancellationToken,
        workers: usize,
    );
}

/// Everything that runs per provider cluster connection: the informer
/// factories, the heartbeat barrier on top of them and the controllers that
/// depend on synced caches.
pub struct ClusterController {
    consumer_secret_ref_key: String,
    factories: Vec<Arc<InformerFactory>>,
    barrier: Arc<HeartbeatBarrier>,
    controllers: Vec<Arc<dyn GenericController>>,
    workers: usize,
}

impl fmt::Debug for ClusterController {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ClusterController")
            .field("consumer_secret_ref_key", &self.consumer_secret_ref_key)
            .field("factories", &self.factories)
            .field("barrier", &self.barrier)
            .field("controllers", &self.controllers.len())
            .finish()
    }
}

impl ClusterController {
    /// `consumer_secret_ref_key` is the `namespace/name` of the kubeconfig
    /// secret the connection was made from.
    pub fn new(
        consumer_secret_ref_key: &str,
        factories: Vec<Arc<InformerFactory>>,
        hook: Arc<dyn ReadinessHook>,
        controllers: Vec<Arc<dyn GenericController>>,
        config: &KonnectorConfig,
    ) -> Result<Self> {
        split_meta_namespace_key(consumer_secret_ref_key)?;

        let waiters = factories
            .iter()
            .map(|factory| factory.clone() as Arc<dyn CacheSyncWaiter>)
            .collect();
        let barrier = HeartbeatBarrier::from_config(waiters, &config.heartbeat, hook)?;

        Ok(Self {
            consumer_secret_ref_key: consumer_secret_ref_key.to_string(),
            factories,
            barrier: Arc::new(barrier),
            controllers,
            workers: config.controllers.workers,
        })
    }

    /// Same as [`ClusterController::new`], reporting readiness on the
    /// bindings that use `consumer_secret_ref_key`.
    pub fn with_binding_status<B: Object + Conditioned>(
        consumer_secret_ref_key: &str,
        factories: Vec<Arc<InformerFactory>>,
        bindings: Arc<dyn Informer<B>>,
        client: Arc<dyn BindingClient<B>>,
        controllers: Vec<Arc<dyn GenericController>>,
        config: &KonnectorConfig,
    ) -> Result<Self> {
        let reporter = BindingStatusReporter::new(consumer_secret_ref_key, bindings, client, config.retry.status_update);
        Self::new(consumer_secret_ref_key, factories, Arc::new(reporter), controllers, config)
    }

    pub fn barrier(&self) -> &HeartbeatBarrier {
        &self.barrier
    }

    /// Starts the factories and the heartbeat, starts the dependent
    /// controllers after the first successful sync, then runs until
    /// `shutdown` is cancelled.
    pub async fn start(
        &self,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(secret_key = %self.consumer_secret_ref_key, factories = self.factories.len(), "Starting cluster controller");
        for factory in &self.factories {
            factory.start(shutdown.clone());
        }

        let barrier = self.barrier.clone();
        let token = shutdown.clone();
        let heartbeat = tokio::spawn(async move { barrier.run(token).await });

        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(self.controllers.len());
        if self.barrier.wait_until_ready(&shutdown).await {
            info!(secret_key = %self.consumer_secret_ref_key, controllers = self.controllers.len(), workers = self.workers, "Informers synced, starting controllers");
            for controller in &self.controllers {
                let controller = controller.clone();
                let token = shutdown.clone();
                let workers = self.workers;
                tasks.push(tokio::spawn(async move { controller.start(token, workers).await }));
            }
        } else {
            warn!(secret_key = %self.consumer_secret_ref_key, "Stopped before informers synced, controllers not started");
        }

        shutdown.cancelled().await;

        // every task is joined before the first failure is returned
        let mut first_error = heartbeat.await.err();
        for task in tasks {
            if let Err(e) = task.await {
                error!(secret_key = %self.consumer_secret_ref_key, error = %e, "Controller task failed");
                first_error.get_or_insert(e);
            }
        }
        for factory in &self.factories {
            factory.wait_stopped().await;
        }
        info!(secret_key = %self.consumer_secret_ref_key, "Cluster controller stopped");
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
