//! Konnector Error Hierarchy
//!
//! Errors are grouped by the layer that raises them: informer plumbing
//! (list/watch, handler registration), status reporting towards the consumer
//! cluster, configuration, and background task supervision.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by external collaborators (list/watch transports,
/// status clients).
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (informers, status writes, tasks)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring the connection to be torn down
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Informer(#[from] InformerError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

#[derive(Debug, thiserror::Error)]
pub enum InformerError {
    /// Listing the current items from the backing store failed
    #[error("List of {resource} failed: {source}")]
    List {
        resource: String,
        #[source]
        source: SourceError,
    },

    /// Opening or reading the watch stream failed
    #[error("Watch of {resource} failed: {source}")]
    Watch {
        resource: String,
        #[source]
        source: SourceError,
    },

    /// Static handler registration on a dynamic informer
    #[error("add_event_handler is not supported on a dynamic informer, use add_dynamic_event_handler")]
    StaticHandlerRejected,

    /// `run` called on an informer that is already running
    #[error("Informer for {0} has already been started")]
    AlreadyStarted(String),

    /// Malformed `namespace/name` key
    #[error("Unexpected key format: {0:?}")]
    InvalidKey(String),

    /// `by_index` called with an index name nobody registered
    #[error("Index with name {0} does not exist")]
    IndexNotFound(String),

    /// Resource registered in a factory under a different item type
    #[error("Resource {resource} is already registered with item type {existing}")]
    ResourceTypeMismatch { resource: String, existing: &'static str },

    /// Indexer registered twice under the same name
    #[error("Indexer conflict: {0}")]
    IndexerConflict(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Failed to persist status on a dependent record
    #[error("Failed to update status of {key}: {source}")]
    Update {
        key: String,
        #[source]
        source: SourceError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Background task failed: {0}")]
    Join(#[from] JoinError),

    /// Single attempt exceeded its timeout
    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    /// Retry policy exhausted
    #[error("{0}")]
    RetryExhausted(String),
}

// ============== Conversion Implementations ============== //
impl From<InformerError> for Error {
    fn from(e: InformerError) -> Self {
        Error::System(SystemError::Informer(e))
    }
}

impl From<StatusError> for Error {
    fn from(e: StatusError) -> Self {
        Error::System(SystemError::Status(e))
    }
}

impl From<TaskError> for Error {
    fn from(e: TaskError) -> Self {
        Error::System(SystemError::Task(e))
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::System(SystemError::Task(TaskError::Join(e)))
    }
}
