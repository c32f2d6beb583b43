// SPDX-License-Identifier: MIT

//! Resource document schema
//!
//! ```yaml
//! apiVersion: github.com/microsoft/PSRule/v1
//! kind: Selector
//! metadata:
//!   name: BasicSelector
//! spec:
//!   if:
//!     field: Name
//!     equals: TargetObject1
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

pub const API_VERSION_V1: &str = "github.com/microsoft/PSRule/v1";
pub const API_VERSION_2025_01_01: &str = "github.com/microsoft/PSRule/2025-01-01";

/// API versions understood by the loader
pub const API_VERSIONS: &[&str] = &[API_VERSION_V1, API_VERSION_2025_01_01];

pub const SELECTOR_KIND: &str = "Selector";

/// Any resource document; `spec` is interpreted according to `kind`
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub spec: JsonValue,
}

impl ResourceDocument {
    pub fn is_selector(&self) -> bool {
        self.kind.eq_ignore_ascii_case(SELECTOR_KIND)
    }

    pub fn is_supported_api_version(&self) -> bool {
        API_VERSIONS.contains(&self.api_version.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ResourceMetadata {
    pub name: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// `spec` of a `Selector` resource
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SelectorSpec {
    #[serde(rename = "if")]
    pub condition: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_selector_document() {
        let yaml = r#"
apiVersion: github.com/microsoft/PSRule/v1
kind: Selector
metadata:
  name: BasicSelector
  annotations:
    export: 'true'
spec:
  if:
    field: Name
    equals: TargetObject1
"#;
        let doc: ResourceDocument = serde_yaml::from_str(yaml).unwrap();
        assert!(doc.is_selector());
        assert!(doc.is_supported_api_version());
        assert_eq!(doc.metadata.name, "BasicSelector");
        assert_eq!(doc.metadata.annotations.get("export").map(String::as_str), Some("true"));

        let spec: SelectorSpec = serde_json::from_value(doc.spec).unwrap();
        assert_eq!(spec.condition, json!({ "field": "Name", "equals": "TargetObject1" }));
    }

    #[test]
    fn test_unsupported_api_version() {
        let doc: ResourceDocument = serde_json::from_value(json!({
            "apiVersion": "example.com/v9",
            "kind": "Rule",
            "metadata": { "name": "r" }
        }))
        .unwrap();
        assert!(!doc.is_selector());
        assert!(!doc.is_supported_api_version());
        assert!(doc.spec.is_null());
    }

    #[test]
    fn test_missing_metadata_is_error() {
        let result: Result<ResourceDocument, _> =
            serde_json::from_value(json!({ "apiVersion": API_VERSION_V1, "kind": "Selector" }));
        assert!(result.is_err());
    }
}
