use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use config::ConfigError;
use futures::future::join_all;
#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::CacheSyncWaiter;
use crate::Error;
use crate::HeartbeatConfig;
use crate::Result;

/// Where the barrier is in its heartbeat cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierState {
    /// Started, no heartbeat evaluated yet
    Initializing,
    /// Waiting for caches to sync until `deadline`
    Waiting { deadline: Instant },
    /// Every waiter synced within the last heartbeat
    Ready,
    /// The last heartbeat timed out after `waited`
    Degraded { waited: Duration },
}

/// Outcome reported to the [`ReadinessHook`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Degraded { waited: Duration },
}

/// Side effect of readiness changes, typically a status condition on every
/// record that depends on the connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadinessHook: Send + Sync + 'static {
    async fn on_readiness_changed(
        &self,
        readiness: Readiness,
    );
}

/// Gates a cluster connection on its informers having synced, and keeps
/// re-checking on every heartbeat.
///
/// ```text
/// Initializing ─▶ Waiting(now + interval/2) ─┬─▶ Ready
///                      ▲                     └─▶ Degraded
///                      └──── every interval ─────┘
/// ```
///
/// Each heartbeat waits at most half the interval, so a failure is reported
/// well before the next tick. A timeout is reported through the hook and
/// retried on the next heartbeat; it is never fatal. Heartbeats run one after
/// the other and never overlap.
pub struct HeartbeatBarrier {
    waiters: Vec<Arc<dyn CacheSyncWaiter>>,
    interval: Duration,
    hook: Arc<dyn ReadinessHook>,

    state_tx: watch::Sender<BarrierState>,
    // latched on the first Ready, never reset
    ready_once_tx: watch::Sender<bool>,
}

impl fmt::Debug for HeartbeatBarrier {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HeartbeatBarrier")
            .field("waiters", &self.waiters.iter().map(|w| w.name()).collect::<Vec<_>>())
            .field("interval", &self.interval)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl HeartbeatBarrier {
    /// Fails on a zero `interval`, which would leave no time to wait for
    /// caches.
    pub fn new(
        waiters: Vec<Arc<dyn CacheSyncWaiter>>,
        interval: Duration,
        hook: Arc<dyn ReadinessHook>,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Config(ConfigError::Message(
                "heartbeat interval must be greater than zero".into(),
            )));
        }

        let (state_tx, _) = watch::channel(BarrierState::Initializing);
        let (ready_once_tx, _) = watch::channel(false);
        Ok(Self {
            waiters,
            interval,
            hook,
            state_tx,
            ready_once_tx,
        })
    }

    pub fn from_config(
        waiters: Vec<Arc<dyn CacheSyncWaiter>>,
        config: &HeartbeatConfig,
        hook: Arc<dyn ReadinessHook>,
    ) -> Result<Self> {
        Self::new(waiters, config.interval(), hook)
    }

    /// Longest a single heartbeat waits for caches
    pub fn sync_timeout(&self) -> Duration {
        self.interval / 2
    }

    pub fn state(&self) -> BarrierState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BarrierState> {
        self.state_tx.subscribe()
    }

    /// Resolves once the barrier has been `Ready` at least once. Returns
    /// false if `cancel` fires first.
    pub async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
    ) -> bool {
        let mut ready_once = self.ready_once_tx.subscribe();
        tokio::select! {
            r = ready_once.wait_for(|ready| *ready) => r.is_ok(),
            _ = cancel.cancelled() => false,
        }
    }

    /// Runs heartbeats until `shutdown` is cancelled. The first heartbeat
    /// starts immediately.
    pub async fn run(
        &self,
        shutdown: CancellationToken,
    ) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ready = false;

        info!(interval = ?self.interval, waiters = self.waiters.len(), "Heartbeat barrier started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(readiness) = self.heartbeat(&shutdown).await else {
                break;
            };

            match readiness {
                Readiness::Ready => {
                    self.state_tx.send_replace(BarrierState::Ready);
                    self.ready_once_tx.send_replace(true);
                    if ready {
                        continue;
                    }
                    ready = true;
                }
                Readiness::Degraded { waited } => {
                    self.state_tx.send_replace(BarrierState::Degraded { waited });
                    ready = false;
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.hook.on_readiness_changed(readiness) => {}
            }
        }
        info!("Heartbeat barrier stopped");
    }

    /// One bounded wait. `None` when `shutdown` fired while waiting.
    async fn heartbeat(
        &self,
        shutdown: &CancellationToken,
    ) -> Option<Readiness> {
        let timeout = self.sync_timeout();
        let deadline = Instant::now() + timeout;
        self.state_tx.send_replace(BarrierState::Waiting { deadline });

        let wait_token = shutdown.child_token();
        let waits = join_all(self.waiters.iter().map(|waiter| {
            let token = wait_token.clone();
            async move { (waiter.name(), waiter.wait_for_cache_sync(token).await) }
        }));
        tokio::pin!(waits);

        let results = tokio::select! {
            results = &mut waits => results,
            _ = sleep_until(deadline) => {
                // waiters return their current status once cancelled
                wait_token.cancel();
                waits.await
            }
        };

        if shutdown.is_cancelled() {
            return None;
        }

        let mut pending: Vec<String> = results
            .iter()
            .flat_map(|(waiter, status)| {
                status
                    .iter()
                    .filter(|(_, synced)| !**synced)
                    .map(move |(resource, _)| format!("{waiter}/{resource}"))
            })
            .collect();

        if pending.is_empty() {
            debug!("All informers synced");
            return Some(Readiness::Ready);
        }

        pending.sort();
        warn!(?timeout, ?pending, "Informers did not sync in time");
        Some(Readiness::Degraded { waited: timeout })
    }
}
