// SPDX-License-Identifier: MIT

//! Engine options
//!
//! Loaded from a YAML or JSON document. Every key is optional:
//!
//! ```yaml
//! configuration:
//!   config1: '123'
//! binding:
//!   targetName: [TargetName, Name]
//!   targetType: [TargetType, Type]
//!   caseSensitive: false
//! execution:
//!   maxDepth: 100
//!   regexSizeLimit: 1048576
//! ```

use crate::coercion::{Coercer, DEFAULT_REGEX_SIZE_LIMIT};
use crate::error::Result;
use crate::query::{QueryOptions, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default options file name
pub const DEFAULT_OPTIONS_FILE: &str = "ps-rule.yaml";

/// Environment variable naming an options file
pub const OPTIONS_ENV: &str = "SELECTOR_OPTIONS";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Values returned by the `configuration` function
    pub configuration: HashMap<String, JsonValue>,
    pub binding: BindingOptions,
    pub execution: ExecutionOptions,
}

/// How the implicit name and type of a target are bound
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BindingOptions {
    /// Fields probed, in order, for `name: '.'`
    pub target_name: Vec<String>,
    /// Fields probed, in order, for `type: '.'`
    pub target_type: Vec<String>,
    pub case_sensitive: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            target_name: vec!["TargetName".to_string(), "Name".to_string()],
            target_type: vec!["TargetType".to_string(), "Type".to_string()],
            case_sensitive: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionOptions {
    /// Bound on condition nesting and descendant search depth
    pub max_depth: usize,
    pub regex_size_limit: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

impl Options {
    /// Parse options from YAML (JSON is accepted too)
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        log::debug!("loaded options from {}", path.as_ref().display());
        Self::from_yaml(&content)
    }

    /// Resolve the options file: an explicit path, then `SELECTOR_OPTIONS`,
    /// then `ps-rule.yaml` in the working directory. Missing defaults are not
    /// an error.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = env::var(OPTIONS_ENV) {
            return Self::load(PathBuf::from(path));
        }
        let default = Path::new(DEFAULT_OPTIONS_FILE);
        if default.is_file() {
            return Self::load(default);
        }
        Ok(Self::default())
    }

    pub fn with_configuration(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.configuration.insert(name.into(), value);
        self
    }

    pub fn coercer(&self) -> Coercer {
        Coercer::default()
    }

    /// Settings for query walks started by the selector engine
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            case_sensitive: self.binding.case_sensitive,
            max_depth: self.execution.max_depth,
            coercer: self.coercer(),
            regex_size_limit: self.execution.regex_size_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.binding.target_name, vec!["TargetName", "Name"]);
        assert_eq!(options.binding.target_type, vec!["TargetType", "Type"]);
        assert!(!options.binding.case_sensitive);
        assert_eq!(options.execution.max_depth, 100);
        assert!(options.configuration.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
configuration:
  config1: '123'
  allowed: [a, b]
binding:
  targetName: [ResourceName]
  caseSensitive: true
execution:
  maxDepth: 10
"#;
        let options = Options::from_yaml(yaml).unwrap();
        assert_eq!(options.configuration.get("config1"), Some(&json!("123")));
        assert_eq!(options.configuration.get("allowed"), Some(&json!(["a", "b"])));
        assert_eq!(options.binding.target_name, vec!["ResourceName"]);
        assert_eq!(options.binding.target_type, vec!["TargetType", "Type"]);
        assert!(options.binding.case_sensitive);
        assert_eq!(options.execution.max_depth, 10);
        assert_eq!(options.execution.regex_size_limit, DEFAULT_REGEX_SIZE_LIMIT);
    }

    #[test]
    fn test_from_empty_and_json() {
        assert!(Options::from_yaml("").unwrap().configuration.is_empty());
        let options = Options::from_yaml(r#"{"configuration": {"n": 1}}"#).unwrap();
        assert_eq!(options.configuration.get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        assert!(Options::from_yaml("binding: [").is_err());
    }

    #[test]
    fn test_query_options() {
        let mut options = Options::default();
        options.binding.case_sensitive = true;
        options.execution.max_depth = 5;
        options.execution.regex_size_limit = 4096;
        let query = options.query_options();
        assert!(query.case_sensitive);
        assert_eq!(query.max_depth, 5);
        assert_eq!(query.regex_size_limit, 4096);
    }
}
