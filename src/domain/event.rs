use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Create,
    Remove,
    StateChange,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Remove => write!(f, "REMOVE"),
            Self::StateChange => write!(f, "STATE_CHANGE"),
        }
    }
}

/// Part of the container an operation touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum Subject {
    Container,
    Variable(String),
    Dependency(String),
    Mount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure { detail: String },
}

/// Audit record published after every container operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub actor: String,
    pub application: String,
    pub container: String,
    pub kind: OperationKind,
    pub subject: Subject,
    pub outcome: Outcome,
}

impl Notification {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure { .. })
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = match &self.subject {
            Subject::Container => String::from("container"),
            Subject::Variable(key) => format!("variable {key}"),
            Subject::Dependency(name) => format!("dependency {name}"),
            Subject::Mount(volume) => format!("mount {volume}"),
        };
        write!(
            f,
            "{} {} on {}/{} by {}",
            self.kind, subject, self.application, self.container, self.actor
        )?;
        if let Outcome::Failure { detail } = &self.outcome {
            write!(f, " failed: {detail}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(outcome: Outcome) -> Notification {
        Notification {
            actor: "alice".into(),
            application: "shop".into(),
            container: "pg".into(),
            kind: OperationKind::Create,
            subject: Subject::Mount("pgdata".into()),
            outcome,
        }
    }

    #[test]
    fn test_serializes_flat_record() {
        let json = serde_json::to_value(notification(Outcome::Success)).unwrap();
        assert_eq!(json["kind"], "CREATE");
        assert_eq!(json["subject"]["type"], "mount");
        assert_eq!(json["subject"]["name"], "pgdata");
        assert_eq!(json["outcome"]["status"], "success");
    }

    #[test]
    fn test_failure_carries_detail() {
        let n = notification(Outcome::Failure {
            detail: "already mounted".into(),
        });
        assert!(n.is_failure());
        assert!(n.to_string().ends_with("failed: already mounted"));
    }
}
