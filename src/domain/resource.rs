//! Flat read-only projections handed to presentation layers

use super::{Container, Mount, Variable, VariableRole, Volume};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeResource {
    pub name: String,
}

impl From<&Volume> for VolumeResource {
    fn from(volume: &Volume) -> Self {
        Self {
            name: volume.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountResource {
    pub volume_name: String,
    pub mount_point: String,
}

impl From<&Mount> for MountResource {
    fn from(mount: &Mount) -> Self {
        Self {
            volume_name: mount.volume_name().to_string(),
            mount_point: mount.mount_point().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableResource {
    pub key: String,
    pub value: String,
    pub role: VariableRole,
}

impl From<&Variable> for VariableResource {
    fn from(variable: &Variable) -> Self {
        Self {
            key: variable.key().to_string(),
            value: variable.value().to_string(),
            role: variable.role(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerResource {
    pub name: String,
    pub image_name: String,
    pub state: String,
    pub variables: Vec<VariableResource>,
    pub dependencies: Vec<String>,
    pub mounts: Vec<MountResource>,
}

impl From<&Container> for ContainerResource {
    fn from(container: &Container) -> Self {
        Self {
            name: container.name().to_string(),
            image_name: container.image_name().to_string(),
            state: container.state().to_string(),
            variables: container.variables().map(VariableResource::from).collect(),
            dependencies: container.dependencies().iter().cloned().collect(),
            mounts: container.mounts().map(MountResource::from).collect(),
        }
    }
}
