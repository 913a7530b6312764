use crate::domain::ContainerState;
use std::fmt::Debug;
use std::sync::Arc;

/// Decides whether a container may move from one state to another.
///
/// The aggregate records whatever it is told; services ask a policy first.
pub trait TransitionPolicy: Send + Sync + Debug {
    fn allows(&self, from: ContainerState, to: ContainerState) -> bool;
}

/// Follows the lifecycle table of [`ContainerState`]:
/// staying put, entering the pending counterpart of a stable state, a pending
/// state reaching its target or falling back to its origin, and failing from
/// anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LifecyclePolicy;

impl TransitionPolicy for LifecyclePolicy {
    fn allows(&self, from: ContainerState, to: ContainerState) -> bool {
        if from == to || to == ContainerState::Failed {
            return true;
        }
        if from.is_stable() {
            return to == from.pending_state();
        }
        to == from.target() || to == from.origin()
    }
}

/// Accepts every transition
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissivePolicy;

impl TransitionPolicy for PermissivePolicy {
    fn allows(&self, _from: ContainerState, _to: ContainerState) -> bool {
        true
    }
}

pub fn policy_for(strict: bool) -> Arc<dyn TransitionPolicy> {
    if strict {
        Arc::new(LifecyclePolicy)
    } else {
        Arc::new(PermissivePolicy)
    }
}
