//! Error types raised while building and checking query nodes.

use thiserror::Error;

/// A node or request was built from an invalid argument.
///
/// Raised by the constructor itself, never deferred to translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConstructionError {
    message: String,
}

impl ConstructionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A translator met a node shape it cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NotSupportedError {
    message: String,
    field: Option<String>,
}

impl NotSupportedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// An error about a specific field name.
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending field name, when one is known.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

/// An expression written for one shape reads a member another shape lacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("member '{member}' {reason} on shape '{shape}'")]
pub struct ShapeMismatchError {
    /// Dotted path of the offending member.
    pub member: String,
    /// Name of the target shape.
    pub shape: String,
    pub reason: String,
}

impl ShapeMismatchError {
    /// The target shape has no member at `member`.
    pub fn missing(member: impl Into<String>, shape: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            shape: shape.into(),
            reason: "does not exist".to_string(),
        }
    }

    /// The target member exists with an incompatible type.
    pub fn incompatible(
        member: impl Into<String>,
        shape: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Self {
            member: member.into(),
            shape: shape.into(),
            reason: format!("has type '{found}', expected '{expected}'"),
        }
    }
}
