use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a variable's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableRole {
    /// Declared by the container itself (image template or explicit add)
    Own,
    /// Copied from a dependency
    Import,
}

impl fmt::Display for VariableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Own => write!(f, "OWN"),
            Self::Import => write!(f, "IMPORT"),
        }
    }
}

/// A variable declaration carried by an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableTemplate {
    pub key: String,
    pub value: String,
}

impl VariableTemplate {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A container-scoped configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    key: String,
    value: String,
    role: VariableRole,
}

impl Variable {
    /// Creates an OWN variable
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            role: VariableRole::Own,
        }
    }

    /// Instantiates an image template for a new container
    pub fn from_template(template: &VariableTemplate) -> Self {
        Self::new(template.key.clone(), template.value.clone())
    }

    /// Copy of this variable as seen by a container that imports it
    pub fn to_imported(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            role: VariableRole::Import,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn role(&self) -> VariableRole {
        self.role
    }

    pub fn is_imported(&self) -> bool {
        self.role == VariableRole::Import
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_variable_is_own() {
        let var = Variable::new("DB_HOST", "pg");
        assert_eq!(var.key(), "DB_HOST");
        assert_eq!(var.value(), "pg");
        assert_eq!(var.role(), VariableRole::Own);
        assert!(!var.is_imported());
    }

    #[test]
    fn test_from_template_keeps_key_and_value() {
        let template = VariableTemplate::new("POSTGRES_USER", "app");
        let var = Variable::from_template(&template);
        assert_eq!(var.key(), "POSTGRES_USER");
        assert_eq!(var.value(), "app");
        assert_eq!(var.role(), VariableRole::Own);
    }

    #[test]
    fn test_to_imported_switches_role_only() {
        let var = Variable::new("PORT", "5432");
        let imported = var.to_imported();
        assert_eq!(imported.key(), "PORT");
        assert_eq!(imported.value(), "5432");
        assert!(imported.is_imported());
        assert_eq!(var.role(), VariableRole::Own);
    }

    #[test]
    fn test_role_serializes_upper_case() {
        let json = serde_json::to_string(&VariableRole::Import).unwrap();
        assert_eq!(json, "\"IMPORT\"");
        assert_eq!(VariableRole::Own.to_string(), "OWN");
    }
}
