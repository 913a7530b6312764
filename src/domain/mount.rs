use serde::{Deserialize, Serialize};

/// Binding of a named volume to a path inside one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    volume_name: String,
    mount_point: String,
}

impl Mount {
    pub fn new(volume_name: impl Into<String>, mount_point: impl Into<String>) -> Self {
        Self {
            volume_name: volume_name.into(),
            mount_point: mount_point.into(),
        }
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// `volume:path`, the form container engines take on the command line
    pub fn to_spec(&self) -> String {
        format!("{}:{}", self.volume_name, self.mount_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_spec() {
        let mount = Mount::new("pgdata", "/var/lib/postgresql/data");
        assert_eq!(mount.volume_name(), "pgdata");
        assert_eq!(mount.mount_point(), "/var/lib/postgresql/data");
        assert_eq!(mount.to_spec(), "pgdata:/var/lib/postgresql/data");
    }
}
