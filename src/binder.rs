// SPDX-License-Identifier: MIT

//! Value binder contract
//!
//! The query and selector engines only ever read target objects through
//! [`Bindable`]. Implementations are provided for `serde_json::Value` and
//! `serde_yaml::Value`; other host representations can be plugged in by
//! implementing the trait.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

/// Shape of a bound value after any host wrapper has been removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
}

/// Read-only access to a dynamically typed object graph.
///
/// Negative indexes passed to [`Bindable::try_get_index`] count from the end
/// of the array. Field lookups try an exact match first and only then fall
/// back to a case-insensitive match when `case_sensitive` is false.
pub trait Bindable {
    fn kind(&self) -> ValueKind;

    fn as_str(&self) -> Option<&str>;

    fn as_bool(&self) -> Option<bool>;

    fn as_i64(&self) -> Option<i64>;

    fn as_f64(&self) -> Option<f64>;

    fn try_get_field(&self, name: &str, case_sensitive: bool) -> Option<&Self>;

    fn try_get_index(&self, index: i64) -> Option<&Self>;

    /// Member names and values of an object, in document order
    fn enumerate_members(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_>;

    /// Elements of an array, in order
    fn enumerate_elements(&self) -> Box<dyn Iterator<Item = &Self> + '_>;

    /// Owned JSON copy, used when a value has to outlive the target borrow
    fn to_json(&self) -> JsonValue;

    fn is_null(&self) -> bool {
        self.kind() == ValueKind::Null
    }

    fn is_array(&self) -> bool {
        self.kind() == ValueKind::Array
    }

    fn is_object(&self) -> bool {
        self.kind() == ValueKind::Object
    }

    /// Number of elements for arrays, `None` otherwise
    fn array_len(&self) -> Option<usize> {
        if self.is_array() {
            Some(self.enumerate_elements().count())
        } else {
            None
        }
    }
}

pub(crate) fn name_matches(candidate: &str, name: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        candidate == name
    } else {
        candidate == name || candidate.to_lowercase() == name.to_lowercase()
    }
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    if resolved < 0 || resolved >= len {
        None
    } else {
        Some(resolved as usize)
    }
}

impl Bindable for JsonValue {
    fn kind(&self) -> ValueKind {
        match self {
            JsonValue::Null => ValueKind::Null,
            JsonValue::Bool(_) => ValueKind::Bool,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            JsonValue::Number(_) => ValueKind::Float,
            JsonValue::String(_) => ValueKind::String,
            JsonValue::Array(_) => ValueKind::Array,
            JsonValue::Object(_) => ValueKind::Object,
        }
    }

    fn as_str(&self) -> Option<&str> {
        JsonValue::as_str(self)
    }

    fn as_bool(&self) -> Option<bool> {
        JsonValue::as_bool(self)
    }

    fn as_i64(&self) -> Option<i64> {
        JsonValue::as_i64(self)
    }

    fn as_f64(&self) -> Option<f64> {
        JsonValue::as_f64(self)
    }

    fn try_get_field(&self, name: &str, case_sensitive: bool) -> Option<&Self> {
        let map = self.as_object()?;
        if let Some(value) = map.get(name) {
            return Some(value);
        }
        if case_sensitive {
            return None;
        }
        map.iter()
            .find(|(k, _)| name_matches(k, name, false))
            .map(|(_, v)| v)
    }

    fn try_get_index(&self, index: i64) -> Option<&Self> {
        let items = self.as_array()?;
        resolve_index(items.len(), index).and_then(|i| items.get(i))
    }

    fn enumerate_members(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_> {
        match self {
            JsonValue::Object(map) => Box::new(map.iter().map(|(k, v)| (k.as_str(), v))),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn enumerate_elements(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match self {
            JsonValue::Array(items) => Box::new(items.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn to_json(&self) -> JsonValue {
        self.clone()
    }

    fn array_len(&self) -> Option<usize> {
        self.as_array().map(Vec::len)
    }
}

/// Strip YAML tags so that `!custom 5` binds like `5`
fn untag(value: &YamlValue) -> &YamlValue {
    match value {
        YamlValue::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

impl Bindable for YamlValue {
    fn kind(&self) -> ValueKind {
        match untag(self) {
            YamlValue::Null => ValueKind::Null,
            YamlValue::Bool(_) => ValueKind::Bool,
            YamlValue::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            YamlValue::Number(_) => ValueKind::Float,
            YamlValue::String(_) => ValueKind::String,
            YamlValue::Sequence(_) => ValueKind::Array,
            YamlValue::Mapping(_) => ValueKind::Object,
            YamlValue::Tagged(_) => ValueKind::Null,
        }
    }

    fn as_str(&self) -> Option<&str> {
        untag(self).as_str()
    }

    fn as_bool(&self) -> Option<bool> {
        untag(self).as_bool()
    }

    fn as_i64(&self) -> Option<i64> {
        untag(self).as_i64()
    }

    fn as_f64(&self) -> Option<f64> {
        untag(self).as_f64()
    }

    fn try_get_field(&self, name: &str, case_sensitive: bool) -> Option<&Self> {
        let map = untag(self).as_mapping()?;
        if let Some(value) = map.get(name) {
            return Some(value);
        }
        if case_sensitive {
            return None;
        }
        map.iter()
            .find(|(k, _)| k.as_str().is_some_and(|k| name_matches(k, name, false)))
            .map(|(_, v)| v)
    }

    fn try_get_index(&self, index: i64) -> Option<&Self> {
        let items = untag(self).as_sequence()?;
        resolve_index(items.len(), index).and_then(|i| items.get(i))
    }

    fn enumerate_members(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_> {
        match untag(self) {
            YamlValue::Mapping(map) => {
                Box::new(map.iter().filter_map(|(k, v)| k.as_str().map(|k| (k, v))))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn enumerate_elements(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match untag(self) {
            YamlValue::Sequence(items) => Box::new(items.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn to_json(&self) -> JsonValue {
        serde_json::to_value(untag(self)).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_field_case_insensitive() {
        let value = json!({"Name": "a", "name": "b"});
        assert_eq!(value.try_get_field("name", false), Some(&json!("b")));
        assert_eq!(value.try_get_field("NAME", false), Some(&json!("a")));
        assert_eq!(value.try_get_field("NAME", true), None);
    }

    #[test]
    fn test_json_negative_index() {
        let value = json!([1, 2, 3]);
        assert_eq!(value.try_get_index(-1), Some(&json!(3)));
        assert_eq!(value.try_get_index(3), None);
        assert_eq!(value.try_get_index(-4), None);
    }

    #[test]
    fn test_json_kinds() {
        assert_eq!(json!(1).kind(), ValueKind::Integer);
        assert_eq!(json!(1.5).kind(), ValueKind::Float);
        assert_eq!(json!("x").kind(), ValueKind::String);
        assert_eq!(json!(null).kind(), ValueKind::Null);
        assert_eq!(json!([1]).array_len(), Some(1));
        assert_eq!(json!({}).array_len(), None);
    }

    #[test]
    fn test_yaml_binding() {
        let value: YamlValue = serde_yaml::from_str("Spec:\n  items: [a, b]\n").unwrap();
        let spec = value.try_get_field("spec", false).unwrap();
        let items = spec.try_get_field("items", false).unwrap();
        assert_eq!(items.kind(), ValueKind::Array);
        assert_eq!(items.try_get_index(1).and_then(Bindable::as_str), Some("b"));
        let names: Vec<&str> = value.enumerate_members().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Spec"]);
        assert_eq!(value.to_json(), json!({"Spec": {"items": ["a", "b"]}}));
    }

    #[test]
    fn test_yaml_tag_is_unwrapped() {
        let value: YamlValue = serde_yaml::from_str("!custom 5").unwrap();
        assert_eq!(value.kind(), ValueKind::Integer);
        assert_eq!(Bindable::as_i64(&value), Some(5));
    }
}
