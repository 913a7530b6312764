//! Error types for orchbox

use crate::domain::ContainerState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("volume '{volume}' is already mounted on container '{container}'")]
    AlreadyMounted { container: String, volume: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("version conflict on container '{name}': expected {expected}, found {found}")]
    Conflict {
        name: String,
        expected: u64,
        found: u64,
    },

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container already exists: {0}")]
    ContainerExists(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("volume not found: {0}")]
    VolumeNotFound(String),

    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("illegal state transition for '{name}': {from} -> {to}")]
    IllegalTransition {
        name: String,
        from: ContainerState,
        to: ContainerState,
    },

    #[error("execution engine failed on '{name}': {message}")]
    Engine { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// True for optimistic-concurrency failures, which callers may retry after a re-read.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
