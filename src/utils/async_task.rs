use std::future::Future;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;
use crate::TaskError;

/// Runs `task` until it succeeds, each attempt bounded by `policy.timeout_ms`,
/// sleeping with exponential backoff between attempts.
///
/// `policy.max_retries == 0` retries forever.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: Future<Output = Result<P>>,
{
    let mut retries: usize = 0;

    loop {
        let last_error: Error = match timeout(policy.timeout(), task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(e)) => {
                warn!(attempt = retries + 1, error = %e, "task failed");
                e
            }
            Err(_) => {
                warn!(attempt = retries + 1, timeout = ?policy.timeout(), "task timed out");
                TaskError::Timeout(policy.timeout()).into()
            }
        };

        retries += 1;
        if policy.max_retries > 0 && retries >= policy.max_retries {
            warn!("Task failed after {} retries", retries);
            return Err(match last_error {
                Error::System(crate::SystemError::Task(TaskError::Timeout(_))) => {
                    TaskError::RetryExhausted(format!("task timed out after {retries} attempts")).into()
                }
                e => e,
            });
        }

        sleep(policy.delay_for(retries as u32 - 1)).await;
    }
}

/// Spawns a named background task and logs its error instead of dropping it.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
