// SPDX-License-Identifier: MIT

//! Typed error handling for selector-rs
//!
//! Compile-time problems (malformed paths, malformed condition documents,
//! invalid version constraints) surface as errors. A path that simply does not
//! resolve against a target is never an error; it is reported as "not found"
//! by the evaluators.

use thiserror::Error;

/// Top-level error type for selector-rs
#[derive(Debug, Error)]
pub enum SelectorError {
    /// Malformed query path
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Malformed condition document
    #[error("Invalid condition at '{path}': {message}")]
    Build { path: String, message: String },

    /// Invalid operator configuration (bad version constraint, bad pattern)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Version grammar errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Named resource was not found
    #[error("Selector '{0}' not found")]
    NotFound(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Structured query-compile failures.
///
/// Every variant carries the original expression and the character position
/// the scanner stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path expression")]
    EmptyExpression,

    #[error("unexpected end of '{expression}' at {position}")]
    UnexpectedEnd { expression: String, position: usize },

    #[error("unexpected character '{found}' in '{expression}' at {position}")]
    UnexpectedChar {
        expression: String,
        position: usize,
        found: char,
    },

    #[error("unterminated filter in '{expression}' at {position}")]
    UnterminatedFilter { expression: String, position: usize },

    #[error("unclosed bracket in '{expression}' at {position}")]
    UnclosedBracket { expression: String, position: usize },

    #[error("unterminated string in '{expression}' at {position}")]
    UnterminatedString { expression: String, position: usize },

    #[error("invalid number in '{expression}' at {position}")]
    InvalidNumber { expression: String, position: usize },

    #[error("unknown operator '{operator}' in '{expression}' at {position}")]
    UnknownOperator {
        expression: String,
        position: usize,
        operator: String,
    },

    #[error("invalid filter in '{expression}': {message}")]
    InvalidFilter { expression: String, message: String },

    #[error("invalid pattern '{pattern}' in '{expression}': {message}")]
    InvalidPattern {
        expression: String,
        pattern: String,
        message: String,
    },
}

impl PathError {
    /// Character offset the error was raised at, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            PathError::EmptyExpression
            | PathError::InvalidFilter { .. }
            | PathError::InvalidPattern { .. } => None,
            PathError::UnexpectedEnd { position, .. }
            | PathError::UnexpectedChar { position, .. }
            | PathError::UnterminatedFilter { position, .. }
            | PathError::UnclosedBracket { position, .. }
            | PathError::UnterminatedString { position, .. }
            | PathError::InvalidNumber { position, .. }
            | PathError::UnknownOperator { position, .. } => Some(*position),
        }
    }
}

/// Version grammar errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("'{0}' is not a valid version")]
    InvalidVersion(String),

    #[error("the version constraint '{0}' is not valid")]
    InvalidConstraint(String),
}

impl SelectorError {
    /// Create a build error for the condition node at `path`
    pub fn build(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for SelectorError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for SelectorError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, SelectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_position() {
        let err = PathError::UnclosedBracket {
            expression: "$[0".to_string(),
            position: 3,
        };
        assert_eq!(err.position(), Some(3));
        assert_eq!(PathError::EmptyExpression.position(), None);
    }

    #[test]
    fn test_path_error_converts() {
        let err: SelectorError = PathError::EmptyExpression.into();
        assert!(matches!(err, SelectorError::Path(_)));
        assert_eq!(err.to_string(), "Path error: empty path expression");
    }

    #[test]
    fn test_build_error_display() {
        let err = SelectorError::build(".allOf[0]", "expected a sequence");
        assert_eq!(
            err.to_string(),
            "Invalid condition at '.allOf[0]': expected a sequence"
        );
    }
}
