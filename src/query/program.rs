// SPDX-License-Identifier: MIT

//! Compiled query programs
//!
//! A [`QueryProgram`] is built once from a path string and can then be
//! evaluated any number of times, from any thread, against independent
//! targets. Evaluation only borrows the target; results are references into
//! it.

use super::filter::PredicateTree;
use super::token::Token;
use super::tokenizer::tokenize;
use crate::binder::{name_matches, Bindable};
use crate::coercion::{Coercer, DEFAULT_REGEX_SIZE_LIMIT};
use crate::error::PathError;

/// Depth bound for descendant searches
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// One compiled step of a query
#[derive(Debug, Clone)]
pub enum Segment {
    Root,
    Current,
    Member { name: String, case_sensitive: bool },
    Index(i64),
    IndexWild,
    DotWild,
    Descendant { name: String, case_sensitive: bool },
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    UnionIndex(Vec<i64>),
    UnionMember(Vec<String>),
    Filter(PredicateTree),
}

impl Segment {
    fn is_sequence(&self) -> bool {
        !matches!(
            self,
            Segment::Root | Segment::Current | Segment::Member { .. } | Segment::Index(_)
        )
    }
}

/// Evaluation settings shared by a whole query walk
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Base case sensitivity; a `+` marker on a member flips it
    pub case_sensitive: bool,
    pub max_depth: usize,
    pub coercer: Coercer,
    /// Size bound for `~=` patterns, both literal and path-produced
    pub regex_size_limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            max_depth: DEFAULT_MAX_DEPTH,
            coercer: Coercer::default(),
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

/// Result of a successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue<'a, T> {
    Scalar(&'a T),
    Sequence(Vec<&'a T>),
}

impl<'a, T> QueryValue<'a, T> {
    pub fn first(&self) -> Option<&'a T> {
        match self {
            QueryValue::Scalar(v) => Some(*v),
            QueryValue::Sequence(items) => items.first().copied(),
        }
    }

    pub fn into_vec(self) -> Vec<&'a T> {
        match self {
            QueryValue::Scalar(v) => vec![v],
            QueryValue::Sequence(items) => items,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, QueryValue::Sequence(_))
    }
}

/// State threaded through one evaluation
pub(crate) struct Walk<'a, 'o, T> {
    pub root: &'a T,
    pub options: &'o QueryOptions,
}

/// An immutable compiled query path
#[derive(Debug, Clone)]
pub struct QueryProgram {
    source: String,
    tokens: Vec<Token>,
    segments: Vec<Segment>,
    is_sequence: bool,
}

impl QueryProgram {
    /// Tokenize and compile a path
    pub fn compile(path: &str) -> Result<Self, PathError> {
        Self::compile_with(path, &QueryOptions::default())
    }

    /// Compile with explicit settings; filter patterns honour
    /// `options.regex_size_limit`
    pub fn compile_with(path: &str, options: &QueryOptions) -> Result<Self, PathError> {
        let tokens = tokenize(path)?;
        let program = Self::from_tokens(path, tokens, options.regex_size_limit)?;
        log::debug!(
            "compiled query '{}' into {} tokens",
            program.source,
            program.tokens.len()
        );
        Ok(program)
    }

    pub(crate) fn from_tokens(
        source: &str,
        tokens: Vec<Token>,
        regex_size_limit: usize,
    ) -> Result<Self, PathError> {
        let segments = compile_segments(source, &tokens, regex_size_limit)?;
        let is_sequence = segments.iter().any(Segment::is_sequence);
        Ok(Self {
            source: source.trim().to_string(),
            tokens,
            segments,
            is_sequence,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when evaluation can yield more than one value
    pub fn is_sequence(&self) -> bool {
        self.is_sequence
    }

    /// Evaluate against `root`. `None` means the path did not resolve.
    pub fn evaluate<'a, T: Bindable>(
        &self,
        root: &'a T,
        case_sensitive: bool,
    ) -> Option<QueryValue<'a, T>> {
        let options = QueryOptions {
            case_sensitive,
            ..QueryOptions::default()
        };
        self.evaluate_with(root, &options)
    }

    pub fn evaluate_with<'a, T: Bindable>(
        &self,
        root: &'a T,
        options: &QueryOptions,
    ) -> Option<QueryValue<'a, T>> {
        let walk = Walk { root, options };
        let mut out = Vec::new();
        if !self.walk(0, root, &walk, &mut out) {
            return None;
        }
        if self.is_sequence {
            Some(QueryValue::Sequence(out))
        } else {
            out.into_iter().next().map(QueryValue::Scalar)
        }
    }

    /// Evaluate and flatten, treating "not found" as empty
    pub fn select<'a, T: Bindable>(&self, root: &'a T, options: &QueryOptions) -> Vec<&'a T> {
        self.evaluate_with(root, options)
            .map(QueryValue::into_vec)
            .unwrap_or_default()
    }

    /// Resolve relative to `current` within an ongoing walk
    pub(crate) fn resolve<'a, T: Bindable>(
        &self,
        current: &'a T,
        walk: &Walk<'a, '_, T>,
    ) -> Option<Vec<&'a T>> {
        let mut out = Vec::new();
        if self.walk(0, current, walk, &mut out) {
            Some(out)
        } else {
            None
        }
    }

    fn walk<'a, T: Bindable>(
        &self,
        at: usize,
        value: &'a T,
        walk: &Walk<'a, '_, T>,
        out: &mut Vec<&'a T>,
    ) -> bool {
        let Some(segment) = self.segments.get(at) else {
            out.push(value);
            return true;
        };
        let next = at + 1;
        match segment {
            Segment::Root => self.walk(next, walk.root, walk, out),
            Segment::Current => self.walk(next, value, walk, out),
            Segment::Member {
                name,
                case_sensitive,
            } => {
                let case_sensitive = walk.options.case_sensitive != *case_sensitive;
                value
                    .try_get_field(name, case_sensitive)
                    .is_some_and(|item| self.walk(next, item, walk, out))
            }
            Segment::Index(index) => value
                .try_get_index(*index)
                .is_some_and(|item| self.walk(next, item, walk, out)),
            Segment::IndexWild | Segment::DotWild => {
                self.fan_out(next, children(value), walk, out)
            }
            Segment::Descendant {
                name,
                case_sensitive,
            } => {
                let case_sensitive = walk.options.case_sensitive != *case_sensitive;
                self.descend(next, value, name, case_sensitive, 0, walk, out)
            }
            Segment::Slice { start, stop, step } => {
                self.slice(next, value, *start, *stop, *step, walk, out)
            }
            Segment::UnionIndex(indexes) => {
                let items = indexes.iter().filter_map(|i| value.try_get_index(*i));
                self.fan_out(next, items, walk, out)
            }
            Segment::UnionMember(names) => {
                let case_sensitive = walk.options.case_sensitive;
                let items = names
                    .iter()
                    .filter_map(|name| value.try_get_field(name, case_sensitive));
                self.fan_out(next, items, walk, out)
            }
            Segment::Filter(predicate) => {
                let items = children(value).filter(|item| predicate.test(*item, walk));
                self.fan_out(next, items, walk, out)
            }
        }
    }

    fn fan_out<'a, T: Bindable>(
        &self,
        next: usize,
        items: impl Iterator<Item = &'a T>,
        walk: &Walk<'a, '_, T>,
        out: &mut Vec<&'a T>,
    ) -> bool {
        let mut success = false;
        for item in items {
            success |= self.walk(next, item, walk, out);
        }
        success
    }

    /// Pre-order search of object members and array elements. A matching
    /// member is yielded and not searched further.
    #[allow(clippy::too_many_arguments)]
    fn descend<'a, T: Bindable>(
        &self,
        next: usize,
        value: &'a T,
        name: &str,
        case_sensitive: bool,
        depth: usize,
        walk: &Walk<'a, '_, T>,
        out: &mut Vec<&'a T>,
    ) -> bool {
        if depth > walk.options.max_depth {
            log::warn!(
                "descendant search for '{}' in '{}' stopped at depth {}",
                name,
                self.source,
                walk.options.max_depth
            );
            return false;
        }
        let wildcard = name == "*";
        let mut success = false;
        if value.is_object() {
            for (key, child) in value.enumerate_members() {
                if wildcard {
                    success |= self.walk(next, child, walk, out);
                    success |= self.descend(next, child, name, case_sensitive, depth + 1, walk, out);
                } else if name_matches(key, name, case_sensitive) {
                    success |= self.walk(next, child, walk, out);
                } else {
                    success |= self.descend(next, child, name, case_sensitive, depth + 1, walk, out);
                }
            }
        } else if value.is_array() {
            for child in value.enumerate_elements() {
                if wildcard {
                    success |= self.walk(next, child, walk, out);
                }
                success |= self.descend(next, child, name, case_sensitive, depth + 1, walk, out);
            }
        }
        success
    }

    /// Bounds are raw indexes: a negative start counts from the end, and a
    /// stop is compared against the index as written. A positive step
    /// normalises negative bounds against the length first.
    #[allow(clippy::too_many_arguments)]
    fn slice<'a, T: Bindable>(
        &self,
        next: usize,
        value: &'a T,
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
        walk: &Walk<'a, '_, T>,
        out: &mut Vec<&'a T>,
    ) -> bool {
        let Some(len) = value.array_len() else {
            return false;
        };
        if step == 0 {
            return false;
        }
        let len = len as i64;
        let mut index = start.unwrap_or(if step > 0 { 0 } else { -1 });
        let mut stop = stop;
        if step > 0 {
            if index < 0 {
                index = (index + len).max(0);
            }
            stop = stop.map(|s| if s < 0 { s + len } else { s });
        }
        let from_front = index >= 0;
        loop {
            if let Some(stop) = stop {
                if (step > 0 && index >= stop) || (step < 0 && index <= stop) {
                    break;
                }
            }
            // Walking backwards past the front must not wrap to the end
            if step < 0 && from_front && index < 0 {
                break;
            }
            let Some(item) = value.try_get_index(index) else {
                break;
            };
            self.walk(next, item, walk, out);
            match index.checked_add(step) {
                Some(i) => index = i,
                None => break,
            }
        }
        true
    }
}

impl PartialEq for QueryProgram {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

/// Direct children: member values of an object, elements of an array
fn children<'a, T: Bindable>(value: &'a T) -> Box<dyn Iterator<Item = &'a T> + 'a> {
    if value.is_object() {
        Box::new(value.enumerate_members().map(|(_, v)| v))
    } else {
        value.enumerate_elements()
    }
}

fn compile_segments(
    source: &str,
    tokens: &[Token],
    regex_size_limit: usize,
) -> Result<Vec<Segment>, PathError> {
    let mut segments = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let segment = match &tokens[i] {
            Token::RootRef => Segment::Root,
            Token::CurrentRef => Segment::Current,
            Token::DotSelector {
                name,
                case_sensitive,
            } => Segment::Member {
                name: name.clone(),
                case_sensitive: *case_sensitive,
            },
            Token::IndexSelector(index) => Segment::Index(*index),
            Token::IndexWildSelector => Segment::IndexWild,
            Token::DotWildSelector => Segment::DotWild,
            Token::DescendantSelector {
                name,
                case_sensitive,
            } => Segment::Descendant {
                name: name.clone(),
                case_sensitive: *case_sensitive,
            },
            Token::ArraySlice { start, stop, step } => Segment::Slice {
                start: *start,
                stop: *stop,
                step: step.unwrap_or(1),
            },
            Token::UnionIndex(items) => Segment::UnionIndex(items.clone()),
            Token::UnionMember(items) => Segment::UnionMember(items.clone()),
            Token::StartFilter => {
                let end = matching_end_filter(source, tokens, i)?;
                let predicate = PredicateTree::compile(source, &tokens[i + 1..end], regex_size_limit)?;
                i = end;
                Segment::Filter(predicate)
            }
            other => {
                return Err(PathError::InvalidFilter {
                    expression: source.to_string(),
                    message: format!("'{}' is only valid inside a filter", other),
                })
            }
        };
        segments.push(segment);
        i += 1;
    }
    Ok(segments)
}

/// Index of the `EndFilter` closing the `StartFilter` at `start`
pub(crate) fn matching_end_filter(
    source: &str,
    tokens: &[Token],
    start: usize,
) -> Result<usize, PathError> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(start) {
        match token {
            Token::StartFilter => depth += 1,
            Token::EndFilter => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(PathError::UnterminatedFilter {
        expression: source.to_string(),
        position: start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fixture() -> Value {
        json!([
            {
                "TargetName": "TestObject1",
                "Spec": {
                    "Properties": {
                        "Kind": "Test",
                        "Value1": 1,
                        "array": [{"id": "1"}, {"id": "2"}],
                        "array2": ["1", "2", "3"]
                    }
                }
            },
            {
                "TargetName": "TestObject2",
                "Spec": {
                    "Properties": {
                        "Kind": "Test2",
                        "Value2": 2,
                        "array": [{"id": "1"}, {"id": "2"}],
                        "array2": ["1", "2", "3"]
                    }
                }
            }
        ])
    }

    fn values<'a>(path: &str, root: &'a Value) -> Vec<&'a Value> {
        QueryProgram::compile(path)
            .unwrap()
            .evaluate(root, false)
            .map(QueryValue::into_vec)
            .unwrap_or_default()
    }

    #[test]
    fn test_scalar_member() {
        let root = fixture();
        let program = QueryProgram::compile("$[0].Spec.Properties.Kind").unwrap();
        assert!(!program.is_sequence());
        assert_eq!(
            program.evaluate(&root, false),
            Some(QueryValue::Scalar(&json!("Test")))
        );
        assert_eq!(values("$[1].spec.properties.kind", &root), vec![&json!("Test2")]);
    }

    #[test]
    fn test_case_sensitive_member() {
        let root = fixture();
        assert!(QueryProgram::compile("$[0].spec")
            .unwrap()
            .evaluate(&root, true)
            .is_none());
        // `+` flips the base sensitivity
        assert!(QueryProgram::compile("$[0]+spec")
            .unwrap()
            .evaluate(&root, false)
            .is_none());
        assert!(QueryProgram::compile("$[0]+spec")
            .unwrap()
            .evaluate(&root, true)
            .is_some());
    }

    #[test]
    fn test_not_found() {
        let root = fixture();
        assert!(QueryProgram::compile("$[5].Spec")
            .unwrap()
            .evaluate(&root, false)
            .is_none());
        assert!(QueryProgram::compile("$[0].Missing")
            .unwrap()
            .evaluate(&root, false)
            .is_none());
        assert!(QueryProgram::compile("$[*].Missing")
            .unwrap()
            .evaluate(&root, false)
            .is_none());
    }

    #[test]
    fn test_wildcard_filter() {
        let root = fixture();
        let program =
            QueryProgram::compile("$[*].Spec.Properties.array[?(@.id=='1')].id").unwrap();
        assert!(program.is_sequence());
        assert_eq!(
            program.evaluate(&root, false),
            Some(QueryValue::Sequence(vec![&json!("1"), &json!("1")]))
        );
    }

    #[test]
    fn test_filter_exists_then_member() {
        let root = fixture();
        assert_eq!(
            values("$[?@.Spec.Properties.Value2].TargetName", &root),
            vec![&json!("TestObject2")]
        );
        assert_eq!(
            values("$[?!@.Spec.Properties.Value2].TargetName", &root),
            vec![&json!("TestObject1")]
        );
    }

    #[test]
    fn test_filter_numeric() {
        let root = fixture();
        assert_eq!(
            values("$[?(@.Spec.Properties.Value2 >= 2)].TargetName", &root),
            vec![&json!("TestObject2")]
        );
        assert!(values("$[?(@.Spec.Properties.Value2 < 2)].TargetName", &root).is_empty());
    }

    #[test]
    fn test_filter_logical() {
        let root = fixture();
        let both = values(
            "$[?(@.TargetName == 'TestObject1' || @.Spec.Properties.Kind == 'Test2')].TargetName",
            &root,
        );
        assert_eq!(both.len(), 2);
        let one = values(
            "$[?(@.TargetName == 'testobject1' && @.Spec.Properties.Kind == 'test')].TargetName",
            &root,
        );
        assert_eq!(one, vec![&json!("TestObject1")]);
    }

    #[test]
    fn test_filter_regex() {
        let root = fixture();
        assert_eq!(
            values("$[?(@.TargetName ~= '2$')].TargetName", &root),
            vec![&json!("TestObject2")]
        );
    }

    #[test]
    fn test_slices() {
        let root = fixture();
        let path = |s: &str| format!("$[0].Spec.Properties.array2{}", s);
        assert_eq!(
            values(&path("[::-1]"), &root),
            vec![&json!("3"), &json!("2"), &json!("1")]
        );
        assert_eq!(values(&path("[2:1:-1]"), &root), vec![&json!("3")]);
        assert!(values(&path("[:1:-1]"), &root).is_empty());
        assert_eq!(values(&path("[-1:]"), &root), vec![&json!("3")]);
        assert_eq!(values(&path("[:2]"), &root), vec![&json!("1"), &json!("2")]);
        assert_eq!(values(&path("[::2]"), &root), vec![&json!("1"), &json!("3")]);
        assert_eq!(
            values(&path("[2::-1]"), &root),
            vec![&json!("3"), &json!("2"), &json!("1")]
        );
        assert_eq!(values("$[:1].TargetName", &root), vec![&json!("TestObject1")]);
    }

    #[test]
    fn test_slice_extreme_steps() {
        let doc = json!({ "items": ["1", "2", "3"] });
        assert_eq!(values("$.items[1::9223372036854775807]", &doc), vec![&json!("2")]);
        assert_eq!(values("$.items[::-9223372036854775808]", &doc), vec![&json!("3")]);
        assert_eq!(
            values("$.items[-9223372036854775808::9223372036854775807]", &doc),
            vec![&json!("1")]
        );
    }

    #[test]
    fn test_members_keep_document_order() {
        let doc = json!({ "zeta": 1, "alpha": 2, "mid": { "b": 3, "a": 4 } });
        assert_eq!(
            values("$.*", &doc),
            vec![&json!(1), &json!(2), &json!({ "b": 3, "a": 4 })]
        );
        assert_eq!(
            values("$..*", &doc),
            vec![&json!(1), &json!(2), &json!({ "b": 3, "a": 4 }), &json!(3), &json!(4)]
        );
        assert_eq!(values("$['mid','zeta']", &doc), vec![&json!({ "b": 3, "a": 4 }), &json!(1)]);

        let parsed: Value = serde_json::from_str(r#"{"z": {"n": 1}, "a": {"n": 2}}"#).unwrap();
        assert_eq!(values("$[?(@.n > 0)].n", &parsed), vec![&json!(1), &json!(2)]);
        assert_eq!(values("$..n", &parsed), vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn test_slice_empty_is_found() {
        let root = fixture();
        let program = QueryProgram::compile("$[0].Spec.Properties.array2[:1:-1]").unwrap();
        assert_eq!(
            program.evaluate(&root, false),
            Some(QueryValue::Sequence(vec![]))
        );
        let zero = QueryProgram::compile("$[0].Spec.Properties.array2[::0]").unwrap();
        assert!(zero.evaluate(&root, false).is_none());
    }

    #[test]
    fn test_unions() {
        let root = fixture();
        assert_eq!(
            values("$[0].Spec.Properties.array2[0,2]", &root),
            vec![&json!("1"), &json!("3")]
        );
        assert_eq!(
            values("$[0].Spec.Properties['Kind','Value1']", &root),
            vec![&json!("Test"), &json!(1)]
        );
    }

    #[test]
    fn test_descendant() {
        let root = fixture();
        assert_eq!(
            values("$..Kind", &root),
            vec![&json!("Test"), &json!("Test2")]
        );
        assert_eq!(values("$..id", &root).len(), 4);
        let doc = json!({"a": {"b": 1}, "c": [2]});
        assert_eq!(
            values("$..*", &doc),
            vec![&json!({"b": 1}), &json!(1), &json!([2]), &json!(2)]
        );
    }

    #[test]
    fn test_wildcards_compose() {
        let doc = json!({"a": [[{"b": 1}], [{"b": 2}]]});
        let (one, two) = (json!(1), json!(2));
        let expected = vec![&one, &two];
        assert_eq!(values("a.[*][*].b", &doc), expected);
        assert_eq!(values("a[*][*].b", &doc), expected);
        assert_eq!(values("a.[*].[*].b", &doc), expected);
    }

    #[test]
    fn test_dot_wild() {
        let doc = json!({"a": {"x": 1, "y": 2}});
        assert_eq!(values("$.a.*", &doc), vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn test_program_equality_ignores_quoting() {
        assert_eq!(
            QueryProgram::compile("$['store'].book").unwrap(),
            QueryProgram::compile("$.store.book").unwrap()
        );
    }

    #[test]
    fn test_yaml_target() {
        let doc: serde_yaml::Value = serde_yaml::from_str("items:\n  - name: a\n  - name: b\n").unwrap();
        let program = QueryProgram::compile("items[*].name").unwrap();
        let names: Vec<&str> = program
            .select(&doc, &QueryOptions::default())
            .into_iter()
            .filter_map(Bindable::as_str)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
