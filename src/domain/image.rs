use super::VariableTemplate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG: &str = "latest";

/// Template a container is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub repository: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub variables: Vec<VariableTemplate>,
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

impl Image {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push(VariableTemplate::new(key, value));
        self
    }

    /// `repository:tag`; an empty tag resolves to `latest`
    pub fn repository_tag(&self) -> String {
        let tag = if self.tag.trim().is_empty() {
            DEFAULT_TAG
        } else {
            self.tag.as_str()
        };
        format!("{}:{}", self.repository, tag)
    }

    pub fn variables(&self) -> &[VariableTemplate] {
        &self.variables
    }
}
