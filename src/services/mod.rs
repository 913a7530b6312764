mod container_service;
mod orchestrator;
pub mod transition;

pub use container_service::{ContainerService, OperationContext};
pub use orchestrator::{Orchestrator, SweepReport};
pub use transition::{LifecyclePolicy, PermissivePolicy, TransitionPolicy, policy_for};
