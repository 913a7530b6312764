pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

// Make test_support available for integration tests
pub mod test_support;

pub use domain::{
    Container, ContainerState, ContainerStore, EventSink, ExecutionEngine, Image, Mount,
    Notification, Variable, VariableRole, Volume,
};
pub use error::{Error, Result};
pub use infra::{FileStore, MemoryStore};
pub use services::{ContainerService, OperationContext, Orchestrator, SweepReport};
