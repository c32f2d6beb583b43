// SPDX-License-Identifier: MIT

//! Selector loader - YAML and JSON resource file loading
//!
//! A file holds any number of resource documents: several YAML documents
//! separated by `---`, or a JSON array. Only `Selector` resources are compiled;
//! other kinds are skipped. A selector that fails to compile is reported as a
//! [`LoadFailure`] without affecting the others in the same file.

use crate::error::{Result, SelectorError};
use crate::selector::{Selector, SelectorBuilder, SelectorRegistry};
use crate::types::{ResourceDocument, SelectorSpec};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::path::Path;

/// A selector resource that could not be compiled
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub error: SelectorError,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "selector '{}': {}", self.name, self.error)
    }
}

/// Selectors compiled from one source, and the ones that failed
#[derive(Debug, Default)]
pub struct LoadedSelectors {
    pub selectors: Vec<Selector>,
    pub failures: Vec<LoadFailure>,
}

/// Loads selector resources
#[derive(Debug, Clone, Default)]
pub struct SelectorLoader {
    builder: SelectorBuilder,
}

impl SelectorLoader {
    pub fn new(builder: SelectorBuilder) -> Self {
        Self { builder }
    }

    /// Split content into resource documents. Empty documents are ignored.
    pub fn parse_documents(content: &str) -> Result<Vec<ResourceDocument>> {
        let mut values = Vec::new();
        for document in serde_yaml::Deserializer::from_str(content) {
            match JsonValue::deserialize(document)? {
                JsonValue::Null => {}
                JsonValue::Array(items) => values.extend(items),
                value => values.push(value),
            }
        }
        values
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(SelectorError::from))
            .collect()
    }

    /// Compile every selector in `content`.
    ///
    /// Only content that cannot be read as resource documents is an error;
    /// selectors with invalid conditions are returned in `failures`.
    pub fn load_str(&self, content: &str) -> Result<LoadedSelectors> {
        let mut loaded = LoadedSelectors::default();
        for document in Self::parse_documents(content)? {
            if !document.is_selector() {
                log::warn!(
                    "skipping resource '{}' of unsupported kind '{}'",
                    document.metadata.name,
                    document.kind
                );
                continue;
            }
            if !document.is_supported_api_version() {
                log::warn!(
                    "skipping selector '{}' with unsupported apiVersion '{}'",
                    document.metadata.name,
                    document.api_version
                );
                continue;
            }
            let name = document.metadata.name;
            let tree = serde_json::from_value::<SelectorSpec>(document.spec)
                .map_err(SelectorError::from)
                .and_then(|spec| self.builder.build(&spec.condition));
            match tree {
                Ok(tree) => {
                    log::debug!("loaded selector '{}' with {} nodes", name, tree.len());
                    loaded.selectors.push(Selector::new(name, tree));
                }
                Err(error) => {
                    let failure = LoadFailure { name, error };
                    log::error!("skipping {}", failure);
                    loaded.failures.push(failure);
                }
            }
        }
        Ok(loaded)
    }

    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<LoadedSelectors> {
        let content = fs::read_to_string(path.as_ref())?;
        log::debug!("loading selectors from {}", path.as_ref().display());
        self.load_str(&content)
    }

    /// Register every selector in a file, returning the ones that failed
    pub fn load_into<P: AsRef<Path>>(&self, path: P, registry: &SelectorRegistry) -> Result<Vec<LoadFailure>> {
        let loaded = self.load_file(path)?;
        for selector in loaded.selectors {
            registry.register(selector);
        }
        Ok(loaded.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use serde_json::json;

    const SELECTORS: &str = r#"
---
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: BasicSelector
spec:
  if:
    field: Name
    equals: TargetObject1

---
apiVersion: github.com/microsoft/PSRule/v1
kind: Rule
metadata:
  name: SomeRule
spec:
  condition:
    field: Name
    exists: true

---
apiVersion: github.com/microsoft/PSRule/2025-01-01
kind: Selector
metadata:
  name: AnyOfSelector
spec:
  if:
    anyOf:
    - field: Value
      greater: 2
    - type: '.'
      equals: Microsoft.Storage
"#;

    #[test]
    fn test_load_multi_document_yaml() {
        let loaded = SelectorLoader::default().load_str(SELECTORS).unwrap();
        assert!(loaded.failures.is_empty());
        let selectors = loaded.selectors;
        let names: Vec<&str> = selectors.iter().map(Selector::name).collect();
        assert_eq!(names, vec!["BasicSelector", "AnyOfSelector"]);

        let options = Options::default();
        assert!(selectors[0].matches(&json!({ "Name": "TargetObject1" }), &options));
        assert!(selectors[1].matches(&json!({ "Value": 3 }), &options));
        assert!(selectors[1].matches(&json!({ "Type": "Microsoft.Storage" }), &options));
    }

    #[test]
    fn test_load_json_array() {
        let content = r#"[
            {
                "apiVersion": "github.com/microsoft/PSRule/v1",
                "kind": "Selector",
                "metadata": { "name": "JsonSelector" },
                "spec": { "if": { "field": "Name", "exists": true } }
            }
        ]"#;
        let selectors = SelectorLoader::default().load_str(content).unwrap().selectors;
        assert_eq!(selectors.len(), 1);
        assert_eq!(selectors[0].name(), "JsonSelector");
    }

    #[test]
    fn test_invalid_selector_does_not_block_siblings() {
        let content = r#"
---
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: Good
spec:
  if:
    field: Name
    exists: true
---
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: Bad
spec:
  if:
    field: version
    version: 'not-a-constraint'
---
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: Broken
spec:
  if:
    field: Name
---
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: NoCondition
spec: {}
"#;
        let loaded = SelectorLoader::default().load_str(content).unwrap();
        let names: Vec<&str> = loaded.selectors.iter().map(Selector::name).collect();
        assert_eq!(names, vec!["Good"]);

        let failed: Vec<&str> = loaded.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(failed, vec!["Bad", "Broken", "NoCondition"]);
        assert!(matches!(loaded.failures[0].error, SelectorError::Version(_)));
        assert!(loaded.failures[1].to_string().starts_with("selector 'Broken':"));
    }

    #[test]
    fn test_load_into_registers_valid_selectors() {
        let dir = std::env::temp_dir().join(format!("selector-rs-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("selectors.yaml");
        fs::write(
            &path,
            r#"
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: Good
spec:
  if:
    field: Name
    exists: true
---
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: Bad
spec:
  if:
    field: Name
    match: '('
"#,
        )
        .unwrap();

        let registry = SelectorRegistry::new();
        let failures = SelectorLoader::default().load_into(&path, &registry).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(registry.names(), vec!["Good"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "Bad");
    }

    #[test]
    fn test_empty_content() {
        assert!(SelectorLoader::default().load_str("").unwrap().selectors.is_empty());
        assert!(SelectorLoader::parse_documents("---\n").unwrap().is_empty());
    }
}
