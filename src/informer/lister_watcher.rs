use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use super::ListResult;
use super::Object;
use super::RawEvent;
use crate::Result;

/// Live feed of raw events. The stream ending (or yielding an error) tells
/// the informer to relist.
pub type WatchStream<T> = BoxStream<'static, Result<RawEvent<T>>>;

/// Transport to a backing object store: one full list plus a watch that
/// resumes from the list's resource version.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListerWatcher<T: Object>: Send + Sync + 'static {
    async fn list(&self) -> Result<ListResult<T>>;

    async fn watch(
        &self,
        resource_version: &str,
    ) -> Result<WatchStream<T>>;
}
