// SPDX-License-Identifier: MIT

//! Diagnostic records explaining why a leaf did not match

use serde::Serialize;
use std::fmt;

/// Where the value a leaf tested came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperandKind {
    Path,
    Name,
    Type,
    Value,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperandKind::Path => "Path",
            OperandKind::Name => "Name",
            OperandKind::Type => "Type",
            OperandKind::Value => "Value",
        };
        f.write_str(s)
    }
}

/// A reason a leaf failed
///
/// `path` uses the same notation as the query language, so it can be fed
/// back into a new query. A path of `.` is treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reason {
    pub kind: OperandKind,
    operand_path: String,
    prefix: String,
    parent: String,
    pub message: String,
}

impl Reason {
    pub fn new(kind: OperandKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operand_path: path.into(),
            prefix: String::new(),
            parent: String::new(),
            message: message.into(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Path of the target itself within the document it was taken from
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    /// Path of the operand, including any sub-selector prefix
    pub fn path(&self) -> String {
        join_path(&self.prefix, &self.operand_path)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path relative to the parent object the target was taken from
    pub fn full_path(&self) -> String {
        join_path(&self.parent, &self.path())
    }

    /// `<Kind> <path>: <message>`, or just the message without a path
    pub fn format(&self) -> String {
        let path = self.path();
        if is_empty_path(&path) {
            self.message.clone()
        } else {
            format!("{} {}: {}", self.kind, path, self.message)
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn is_empty_path(s: &str) -> bool {
    s.trim().is_empty() || s == "."
}

/// Join two dotted paths, treating empty and `.` as nothing
pub(crate) fn join_path(a: &str, b: &str) -> String {
    match (is_empty_path(a), is_empty_path(b)) {
        (true, true) => String::new(),
        (true, false) => b.to_string(),
        (false, true) => a.to_string(),
        (false, false) if b.starts_with('[') => format!("{}{}", a, b),
        (false, false) => format!("{}.{}", a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_path() {
        let reason = Reason::new(OperandKind::Path, "name", "Is set to 'TestObject1'.");
        assert_eq!(reason.format(), "Path name: Is set to 'TestObject1'.");
        assert_eq!(reason.to_string(), reason.format());
    }

    #[test]
    fn test_format_without_path() {
        let reason = Reason::new(OperandKind::Value, "", "The value is null.");
        assert_eq!(reason.format(), "The value is null.");

        let reason = Reason::new(OperandKind::Path, ".", "Reset to root.");
        assert_eq!(reason.format(), "Reset to root.");
    }

    #[test]
    fn test_prefix_and_parent() {
        let reason = Reason::new(OperandKind::Path, "name", "Does not exist.")
            .with_prefix("resources[1]")
            .with_parent("template");
        assert_eq!(reason.path(), "resources[1].name");
        assert_eq!(reason.full_path(), "template.resources[1].name");
        assert_eq!(reason.format(), "Path resources[1].name: Does not exist.");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path(".", "a"), "a");
        assert_eq!(join_path("a", "."), "a");
        assert_eq!(join_path("a", "b"), "a.b");
        assert_eq!(join_path("a", "[0]"), "a[0]");
    }
}
