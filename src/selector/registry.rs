// SPDX-License-Identifier: MIT

use super::Selector;
use crate::error::{Result, SelectorError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Named compiled selectors, shared between clones.
///
/// Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct SelectorRegistry {
    selectors: Arc<RwLock<HashMap<String, Arc<Selector>>>>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a selector, replacing any with the same name
    pub fn register(&self, selector: Selector) -> Option<Arc<Selector>> {
        let mut selectors = self.selectors.write().unwrap_or_else(PoisonError::into_inner);
        let previous = selectors.insert(selector.name().to_lowercase(), Arc::new(selector));
        if let Some(previous) = &previous {
            log::warn!("selector '{}' was redefined", previous.name());
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<Arc<Selector>> {
        let selectors = self.selectors.read().unwrap_or_else(PoisonError::into_inner);
        selectors.get(&name.to_lowercase()).cloned()
    }

    /// Like [`get`](Self::get), but a missing name is an error
    pub fn require(&self, name: &str) -> Result<Arc<Selector>> {
        self.get(name)
            .ok_or_else(|| SelectorError::NotFound(name.to_string()))
    }

    /// Every selector, ordered by name
    pub fn all(&self) -> Vec<Arc<Selector>> {
        let selectors = self.selectors.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Arc<Selector>> = selectors.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Selector names in sorted order
    pub fn names(&self) -> Vec<String> {
        let selectors = self.selectors.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = selectors.values().map(|s| s.name().to_string()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.selectors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SelectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorRegistry")
            .field("selectors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::SelectorBuilder;
    use super::*;
    use serde_json::json;

    fn selector(name: &str) -> Selector {
        let tree = SelectorBuilder::default()
            .build(&json!({ "field": "Name", "exists": true }))
            .unwrap();
        Selector::new(name, tree)
    }

    #[test]
    fn test_register_and_get_selector() {
        let registry = SelectorRegistry::new();
        assert!(registry.register(selector("BasicSelector")).is_none());

        let retrieved = registry.get("basicselector");
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "BasicSelector");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_require_missing_selector() {
        let registry = SelectorRegistry::new();
        registry.register(selector("Present"));
        assert!(registry.require("PRESENT").is_ok());

        let err = registry.require("Absent").unwrap_err();
        assert!(matches!(err, SelectorError::NotFound(ref name) if name == "Absent"));
        assert_eq!(err.to_string(), "Selector 'Absent' not found");
    }

    #[test]
    fn test_register_overwrites_existing() {
        let registry = SelectorRegistry::new();
        registry.register(selector("same_name"));
        assert!(registry.register(selector("Same_Name")).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["Same_Name"]);
    }

    #[test]
    fn test_registry_is_clone() {
        let registry = SelectorRegistry::new();
        registry.register(selector("one"));

        let cloned = registry.clone();
        assert!(cloned.get("one").is_some());

        cloned.register(selector("two"));
        assert!(registry.get("two").is_some());
        assert_eq!(registry.names(), vec!["one", "two"]);
    }
}
