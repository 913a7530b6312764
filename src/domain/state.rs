use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a container.
///
/// Stable states are resting points an operator can observe between
/// operations. Every stable state has exactly one pending counterpart that
/// marks an in-flight move away from it.
///
/// | stable    | pending      | pending heads to |
/// |-----------|--------------|------------------|
/// | `Stopped` | `Starting`   | `Running`        |
/// | `Running` | `Stopping`   | `Stopped`        |
/// | `Failed`  | `Recovering` | `Stopped`        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
    Recovering,
}

impl ContainerState {
    pub const ALL: [ContainerState; 6] = [
        Self::Stopped,
        Self::Starting,
        Self::Running,
        Self::Stopping,
        Self::Failed,
        Self::Recovering,
    ];

    /// State of a freshly created container
    pub const INITIAL: ContainerState = Self::Stopped;

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Recovering)
    }

    pub fn is_stable(self) -> bool {
        !self.is_pending()
    }

    /// Pending counterpart of a stable state. Pending states map to themselves.
    pub fn pending_state(self) -> ContainerState {
        match self {
            Self::Stopped => Self::Starting,
            Self::Running => Self::Stopping,
            Self::Failed => Self::Recovering,
            pending => pending,
        }
    }

    /// Stable state a pending state is heading toward
    pub fn target(self) -> ContainerState {
        match self {
            Self::Starting => Self::Running,
            Self::Stopping | Self::Recovering => Self::Stopped,
            stable => stable,
        }
    }

    /// Stable state a pending state moved away from
    pub fn origin(self) -> ContainerState {
        match self {
            Self::Starting => Self::Stopped,
            Self::Stopping => Self::Running,
            Self::Recovering => Self::Failed,
            stable => stable,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Failed => "FAILED",
            Self::Recovering => "RECOVERING",
        }
    }
}

impl Default for ContainerState {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown container state '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stable_state_has_distinct_pending() {
        let stable: Vec<_> = ContainerState::ALL
            .into_iter()
            .filter(|s| s.is_stable())
            .collect();
        assert_eq!(stable.len(), 3);

        let mut pendings: Vec<_> = stable.iter().map(|s| s.pending_state()).collect();
        assert!(pendings.iter().all(|p| p.is_pending()));
        pendings.dedup();
        assert_eq!(pendings.len(), 3);
    }

    #[test]
    fn test_pending_state_is_idempotent() {
        for state in ContainerState::ALL {
            let once = state.pending_state();
            assert_eq!(once.pending_state(), once, "{state}");
        }
    }

    #[test]
    fn test_pending_origin_round_trip() {
        for state in ContainerState::ALL.into_iter().filter(|s| s.is_stable()) {
            assert_eq!(state.pending_state().origin(), state);
        }
    }

    #[test]
    fn test_targets() {
        assert_eq!(ContainerState::Starting.target(), ContainerState::Running);
        assert_eq!(ContainerState::Stopping.target(), ContainerState::Stopped);
        assert_eq!(ContainerState::Recovering.target(), ContainerState::Stopped);
        assert_eq!(ContainerState::Failed.target(), ContainerState::Failed);
    }

    #[test]
    fn test_initial_state_is_stable_and_not_running() {
        assert!(ContainerState::INITIAL.is_stable());
        assert_ne!(ContainerState::INITIAL, ContainerState::Running);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("running".parse::<ContainerState>(), Ok(ContainerState::Running));
        assert_eq!(" STOPPING ".parse::<ContainerState>(), Ok(ContainerState::Stopping));
        assert!("paused".parse::<ContainerState>().is_err());
        assert_eq!(ContainerState::Recovering.to_string(), "RECOVERING");
    }

    #[test]
    fn test_serde_uses_upper_case_names() {
        let json = serde_json::to_string(&ContainerState::Starting).unwrap();
        assert_eq!(json, "\"STARTING\"");
        let back: ContainerState = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(back, ContainerState::Failed);
    }
}
