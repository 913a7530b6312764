use super::{Container, Notification};
use crate::error::Result;
use std::fmt::Debug;

/// Durable record of containers, keyed by name, with optimistic concurrency
pub trait ContainerStore: Send + Sync + Debug {
    /// Look up a container by name
    fn find(&self, name: &str) -> Result<Option<Container>>;

    /// All stored containers, ordered by name
    fn list(&self) -> Result<Vec<Container>>;

    /// Write a container.
    ///
    /// The stored version must equal `container.version()` (0 for a container
    /// that was never saved), otherwise the write fails with
    /// `Error::Conflict`. On success the store assigns an id if needed and
    /// bumps the version on both the record and `container`.
    fn save(&self, container: &mut Container) -> Result<()>;

    /// Delete a container, with the same version check as `save`
    fn delete(&self, container: &Container) -> Result<()>;
}

/// Receiver of audit notifications
pub trait EventSink: Send + Sync + Debug {
    fn publish(&self, notification: &Notification) -> Result<()>;
}

/// The engine that actually runs containers
pub trait ExecutionEngine: Send + Sync + Debug {
    /// Start a container and return once the engine reports an outcome
    fn start(&self, container: &Container) -> Result<()>;

    /// Stop a container and return once the engine reports an outcome
    fn stop(&self, container: &Container) -> Result<()>;
}
