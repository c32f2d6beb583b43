// SPDX-License-Identifier: MIT

//! Per-target evaluation state

use super::reason::{join_path, OperandKind, Reason};
use crate::binder::Bindable;
use crate::coercion::{compile_pattern, Coercer};
use crate::functions::FunctionScope;
use crate::options::Options;
use crate::query::{QueryOptions, QueryProgram, QueryValue};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A value a leaf operates on: borrowed from the target, or produced while
/// evaluating (a bound name, a literal, a function result, a flattened
/// sequence).
#[derive(Debug)]
pub(crate) enum OperandValue<'a, T> {
    Target(&'a T),
    Owned(JsonValue),
}

#[derive(Debug)]
pub(crate) struct Operand<'a, T> {
    pub kind: OperandKind,
    pub path: String,
    pub value: OperandValue<'a, T>,
}

/// Mutable state for evaluating one target.
///
/// Created fresh for each target and dropped afterwards.
pub struct EvaluationContext<'a, T> {
    root: &'a T,
    options: &'a Options,
    query: QueryOptions,
    current: Vec<&'a T>,
    prefix: Vec<String>,
    reasons: Vec<Reason>,
    patterns: HashMap<(String, bool), Regex>,
    target_name: Option<String>,
    target_type: Option<String>,
    parent: String,
}

impl<'a, T: Bindable> EvaluationContext<'a, T> {
    pub fn new(target: &'a T, options: &'a Options) -> Self {
        Self {
            root: target,
            options,
            query: options.query_options(),
            current: Vec::new(),
            prefix: Vec::new(),
            reasons: Vec::new(),
            patterns: HashMap::new(),
            target_name: None,
            target_type: None,
            parent: String::new(),
        }
    }

    /// Use a name bound by the host instead of probing fields
    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Use a type bound by the host instead of probing fields
    pub fn with_target_type(mut self, ty: impl Into<String>) -> Self {
        self.target_type = Some(ty.into());
        self
    }

    /// Path of the target within a larger document, recorded on every reason
    pub fn with_parent_path(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn target(&self) -> &'a T {
        self.root
    }

    /// The value leaves resolve fields against
    pub fn current(&self) -> &'a T {
        self.current.last().copied().unwrap_or(self.root)
    }

    pub fn reasons(&self) -> &[Reason] {
        &self.reasons
    }

    pub fn take_reasons(&mut self) -> Vec<Reason> {
        std::mem::take(&mut self.reasons)
    }

    pub fn options(&self) -> &Options {
        self.options
    }

    pub(crate) fn query_options(&self) -> &QueryOptions {
        &self.query
    }

    /// Enter a sub-selector item
    pub(crate) fn push_item(&mut self, item: &'a T, prefix: String) {
        self.current.push(item);
        self.prefix.push(prefix);
    }

    pub(crate) fn pop_item(&mut self) {
        self.current.pop();
        self.prefix.pop();
    }

    pub(crate) fn reason_count(&self) -> usize {
        self.reasons.len()
    }

    pub(crate) fn truncate_reasons(&mut self, len: usize) {
        self.reasons.truncate(len);
    }

    fn prefix(&self) -> String {
        self.prefix
            .iter()
            .fold(String::new(), |acc, p| join_path(&acc, p))
    }

    pub(crate) fn reason(&mut self, kind: OperandKind, path: &str, message: String) {
        let reason = Reason::new(kind, path, message)
            .with_prefix(self.prefix())
            .with_parent(self.parent.as_str());
        log::debug!("reason: {}", reason);
        self.reasons.push(reason);
    }

    /// Resolve a field against the current value. A sequence path yields its
    /// items as an array.
    pub(crate) fn resolve(&self, program: &QueryProgram) -> Option<OperandValue<'a, T>> {
        match program.evaluate_with(self.current(), &self.query)? {
            QueryValue::Scalar(value) => Some(OperandValue::Target(value)),
            QueryValue::Sequence(items) => Some(OperandValue::Owned(JsonValue::Array(
                items.into_iter().map(Bindable::to_json).collect(),
            ))),
        }
    }

    pub(crate) fn field(&mut self, program: &QueryProgram) -> Option<Operand<'a, T>> {
        match self.resolve(program) {
            Some(value) => Some(Operand {
                kind: OperandKind::Path,
                path: program.source().to_string(),
                value,
            }),
            None => {
                self.not_has_field(program.source());
                None
            }
        }
    }

    pub(crate) fn not_has_field(&mut self, field: &str) {
        self.reason(
            OperandKind::Path,
            field,
            format!("The field '{}' does not exist.", field),
        );
    }

    /// The bound name and the field it was read from
    pub(crate) fn bind_name(&self) -> Option<(String, String)> {
        if let Some(name) = &self.target_name {
            return Some((name.clone(), String::new()));
        }
        self.bind(&self.options.binding.target_name)
    }

    pub(crate) fn bind_type(&self) -> Option<(String, String)> {
        if let Some(ty) = &self.target_type {
            return Some((ty.clone(), String::new()));
        }
        self.bind(&self.options.binding.target_type)
    }

    fn bind(&self, fields: &[String]) -> Option<(String, String)> {
        let current = self.current();
        let case_sensitive = self.options.binding.case_sensitive;
        fields.iter().find_map(|field| {
            current
                .try_get_field(field, case_sensitive)
                .and_then(Bindable::as_str)
                .filter(|s| !s.is_empty())
                .map(|s| (s.to_string(), field.clone()))
        })
    }

    /// Compile a pattern produced at evaluation time, caching the result
    pub(crate) fn pattern(&mut self, pattern: &str, case_sensitive: bool) -> Option<Regex> {
        let key = (pattern.to_string(), case_sensitive);
        if let Some(regex) = self.patterns.get(&key) {
            return Some(regex.clone());
        }
        match compile_pattern(pattern, case_sensitive, self.options.execution.regex_size_limit) {
            Ok(regex) => {
                self.patterns.insert(key, regex.clone());
                Some(regex)
            }
            Err(e) => {
                log::warn!("invalid regular expression '{}': {}", pattern, e);
                None
            }
        }
    }
}

impl<T: Bindable> FunctionScope for EvaluationContext<'_, T> {
    fn configuration(&self, name: &str) -> Option<JsonValue> {
        self.options.configuration.get(name).cloned()
    }

    fn query(&self, program: &QueryProgram) -> Option<JsonValue> {
        program
            .evaluate_with(self.current(), &self.query)
            .and_then(|value| value.first())
            .map(Bindable::to_json)
    }

    fn coercer(&self) -> Coercer {
        self.query.coercer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_name_and_type() {
        let options = Options::default();
        let target = json!({ "Name": "TestObject1", "type": "Microsoft.Storage" });
        let ctx = EvaluationContext::new(&target, &options);
        assert_eq!(ctx.bind_name(), Some(("TestObject1".to_string(), "Name".to_string())));
        assert_eq!(ctx.bind_type(), Some(("Microsoft.Storage".to_string(), "Type".to_string())));

        let ctx = EvaluationContext::new(&target, &options).with_target_name("Bound");
        assert_eq!(ctx.bind_name(), Some(("Bound".to_string(), String::new())));
    }

    #[test]
    fn test_resolve_and_reasons() {
        let options = Options::default();
        let target = json!({ "items": [{ "id": 1 }, { "id": 2 }], "name": "x" });
        let mut ctx = EvaluationContext::new(&target, &options);

        let program = QueryProgram::compile("items[*].id").unwrap();
        match ctx.resolve(&program) {
            Some(OperandValue::Owned(value)) => assert_eq!(value, json!([1, 2])),
            other => panic!("unexpected {:?}", other),
        }

        let program = QueryProgram::compile("missing").unwrap();
        assert!(ctx.field(&program).is_none());
        assert_eq!(ctx.reasons().len(), 1);
        assert_eq!(ctx.reasons()[0].format(), "Path missing: The field 'missing' does not exist.");
    }

    #[test]
    fn test_item_scope_prefixes_reasons() {
        let options = Options::default();
        let target = json!({ "items": [{ "id": 1 }] });
        let mut ctx = EvaluationContext::new(&target, &options);
        let item = target.try_get_field("items", false).unwrap().try_get_index(0).unwrap();

        ctx.push_item(item, "items[0]".to_string());
        assert_eq!(ctx.current(), item);
        ctx.not_has_field("name");
        ctx.pop_item();
        assert_eq!(ctx.current(), &target);

        assert_eq!(ctx.reasons()[0].path(), "items[0].name");
        assert_eq!(ctx.reasons()[0].full_path(), "items[0].name");
        assert_eq!(ctx.take_reasons().len(), 1);
        assert!(ctx.reasons().is_empty());
    }

    #[test]
    fn test_parent_path_is_recorded() {
        let options = Options::default();
        let target = json!({ "items": [{ "id": 1 }] });
        let mut ctx = EvaluationContext::new(&target, &options).with_parent_path("template.resources[3]");
        let item = target.try_get_field("items", false).unwrap().try_get_index(0).unwrap();

        ctx.push_item(item, "items[0]".to_string());
        ctx.not_has_field("name");
        ctx.pop_item();

        let reason = &ctx.reasons()[0];
        assert_eq!(reason.path(), "items[0].name");
        assert_eq!(reason.full_path(), "template.resources[3].items[0].name");
        assert_eq!(reason.format(), "Path items[0].name: The field 'name' does not exist.");
    }

    #[test]
    fn test_function_scope() {
        let options = Options::default().with_configuration("config1", json!("123"));
        let target = json!({ "name": "TestObject1" });
        let ctx = EvaluationContext::new(&target, &options);
        assert_eq!(ctx.configuration("config1"), Some(json!("123")));
        assert_eq!(ctx.configuration("missing"), None);
        let program = QueryProgram::compile("name").unwrap();
        assert_eq!(FunctionScope::query(&ctx, &program), Some(json!("TestObject1")));
    }

    #[test]
    fn test_pattern_cache() {
        let options = Options::default();
        let target = json!({});
        let mut ctx = EvaluationContext::new(&target, &options);
        assert!(ctx.pattern("^a+$", false).unwrap().is_match("AA"));
        assert!(!ctx.pattern("^a+$", true).unwrap().is_match("AA"));
        assert_eq!(ctx.patterns.len(), 2);
        assert!(ctx.pattern("(", false).is_none());
    }
}
