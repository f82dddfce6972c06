use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::conditions;
use super::conditions::Conditioned;
use super::conditions::Severity;
use super::conditions::INFORMERS_SYNCED;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::Informer;
use crate::Object;
use crate::Readiness;
use crate::ReadinessHook;
use crate::Result;
use crate::StatusError;

/// Index on the binding store: kubeconfig secret key -> bindings using it
pub const BY_KUBECONFIG_SECRET: &str = "by-kubeconfig-secret";

/// Write access to binding status on the consumer cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BindingClient<B: Send + Sync + 'static>: Send + Sync + 'static {
    async fn update_status(
        &self,
        binding: B,
    ) -> Result<()>;
}

/// Mirrors barrier readiness into the `InformersSynced` condition of every
/// binding that uses the connection's kubeconfig secret.
pub struct BindingStatusReporter<B: Object + Conditioned> {
    secret_key: String,
    bindings: Arc<dyn Informer<B>>,
    client: Arc<dyn BindingClient<B>>,
    policy: BackoffPolicy,
}

impl<B: Object + Conditioned> fmt::Debug for BindingStatusReporter<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("BindingStatusReporter")
            .field("secret_key", &self.secret_key)
            .field("bindings", &self.bindings.resource())
            .finish_non_exhaustive()
    }
}

impl<B: Object + Conditioned> BindingStatusReporter<B> {
    /// `bindings` must carry the [`BY_KUBECONFIG_SECRET`] index.
    pub fn new(
        secret_key: impl Into<String>,
        bindings: Arc<dyn Informer<B>>,
        client: Arc<dyn BindingClient<B>>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            bindings,
            client,
            policy,
        }
    }

    /// Applies `readiness` to one binding. Returns whether a write happened.
    async fn report(
        &self,
        binding: &B,
        readiness: Readiness,
    ) -> Result<bool> {
        let mut updated = binding.clone();
        match readiness {
            Readiness::Ready => conditions::mark_true(updated.conditions_mut(), INFORMERS_SYNCED),
            Readiness::Degraded { waited } => conditions::mark_false(
                updated.conditions_mut(),
                INFORMERS_SYNCED,
                "",
                Severity::Error,
                format!("Informers did not sync within {waited:?}"),
            ),
        }

        if updated.conditions() == binding.conditions() {
            return Ok(false);
        }

        let update = || {
            let client = self.client.clone();
            let binding = updated.clone();
            async move { client.update_status(binding).await }
        };
        task_with_timeout_and_exponential_backoff(update, self.policy)
            .await
            .map_err(|e| StatusError::Update {
                key: binding.key(),
                source: Box::new(e),
            })?;
        Ok(true)
    }
}

#[async_trait]
impl<B: Object + Conditioned> ReadinessHook for BindingStatusReporter<B> {
    async fn on_readiness_changed(
        &self,
        readiness: Readiness,
    ) {
        let bindings = match self.bindings.store().by_index(BY_KUBECONFIG_SECRET, &self.secret_key) {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(secret_key = %self.secret_key, error = %e, "Failed to list service bindings");
                return;
            }
        };

        let mut written = 0;
        for binding in &bindings {
            match self.report(binding, readiness).await {
                Ok(true) => written += 1,
                Ok(false) => debug!(binding = %binding.key(), "Binding status unchanged"),
                Err(e) => warn!(binding = %binding.key(), error = %e, "Failed to update service binding"),
            }
        }
        info!(secret_key = %self.secret_key, ?readiness, bindings = bindings.len(), written, "Binding status reported");
    }
}
