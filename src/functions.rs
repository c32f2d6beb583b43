// SPDX-License-Identifier: MIT

//! Pure functions usable as value sources inside selector parameters.
//!
//! A function expression is written as a mapping under a `$` key:
//!
//! ```yaml
//! value:
//!   $:
//!     padLeft:
//!       path: name
//!     totalLength: 10
//!     paddingCharacter: '0'
//! ```
//!
//! Nested mappings inside a function body are functions themselves; sequences
//! may mix literal values and functions. Bodies are compiled once when the
//! selector is built and evaluated against a [`FunctionScope`] per target.

use crate::coercion::Coercer;
use crate::error::{Result, SelectorError};
use crate::query::QueryProgram;
use regex::{NoExpand, RegexBuilder};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Key that marks a mapping as a function expression
pub const FUNCTION_KEY: &str = "$";

const DELIMITER: &str = "delimiter";
const OLD_STRING: &str = "oldstring";
const NEW_STRING: &str = "newstring";
const CASE_SENSITIVE: &str = "casesensitive";
const LENGTH: &str = "length";
const TOTAL_LENGTH: &str = "totalLength";
const PADDING_CHARACTER: &str = "paddingCharacter";

/// What a function can see while it is evaluated
pub trait FunctionScope {
    /// A value from the externally loaded configuration map
    fn configuration(&self, name: &str) -> Option<JsonValue>;

    /// First value `program` yields against the current target
    fn query(&self, program: &QueryProgram) -> Option<JsonValue>;

    fn coercer(&self) -> Coercer;
}

/// A compiled function, evaluated once per target
#[derive(Clone)]
pub struct ExprFn(Arc<dyn Fn(&dyn FunctionScope) -> JsonValue + Send + Sync>);

impl ExprFn {
    pub fn new(f: impl Fn(&dyn FunctionScope) -> JsonValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn constant(value: JsonValue) -> Self {
        Self::new(move |_| value.clone())
    }

    pub fn call(&self, scope: &dyn FunctionScope) -> JsonValue {
        (self.0)(scope)
    }
}

impl fmt::Debug for ExprFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExprFn")
    }
}

/// One argument inside a function body
#[derive(Debug, Clone)]
pub enum FnArg {
    Value(JsonValue),
    Function(ExprFn),
    List(Vec<FnArg>),
}

impl FnArg {
    pub fn evaluate(&self, scope: &dyn FunctionScope) -> JsonValue {
        match self {
            FnArg::Value(value) => value.clone(),
            FnArg::Function(f) => f.call(scope),
            FnArg::List(items) => JsonValue::Array(items.iter().map(|item| item.evaluate(scope)).collect()),
        }
    }

    /// Use the argument as a value producer
    fn into_fn(self) -> ExprFn {
        match self {
            FnArg::Value(value) => ExprFn::constant(value),
            FnArg::Function(f) => f,
            list @ FnArg::List(_) => ExprFn::new(move |scope| list.evaluate(scope)),
        }
    }

    fn as_literal(&self) -> Option<&JsonValue> {
        match self {
            FnArg::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Named arguments of one function body, in document order
#[derive(Debug, Clone, Default)]
pub struct FunctionBag {
    entries: Vec<(String, FnArg)>,
}

impl FunctionBag {
    pub fn insert(&mut self, name: impl Into<String>, arg: FnArg) {
        self.entries.push((name.into(), arg));
    }

    pub fn get(&self, name: &str) -> Option<&FnArg> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, arg)| arg)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    fn producer(&self, name: &str) -> Option<ExprFn> {
        self.get(name).cloned().map(FnArg::into_fn)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.get(name)?.as_literal()?.as_str().map(str::to_string)
    }

    fn int(&self, name: &str) -> Option<i64> {
        Coercer::default().try_long(self.get(name)?.as_literal()?, true)
    }

    fn bool(&self, name: &str) -> Option<bool> {
        Coercer::default().try_bool(self.get(name)?.as_literal()?, true)
    }

    fn string_list(&self, name: &str) -> Option<Vec<String>> {
        match self.get(name)? {
            FnArg::Value(JsonValue::String(s)) => Some(vec![s.clone()]),
            FnArg::Value(JsonValue::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            FnArg::List(items) => items
                .iter()
                .map(|item| item.as_literal().and_then(JsonValue::as_str).map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

/// Turns a function body into a compiled function, or `None` when the body's
/// arguments are unusable.
pub type FunctionBuilder = fn(&FunctionBag) -> Option<ExprFn>;

/// A registry of named functions
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionBuilder>,
}

impl FunctionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers a function. Names are matched case-insensitively.
    pub fn register(&mut self, name: &str, builder: FunctionBuilder) {
        self.functions.insert(name.to_lowercase(), builder);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionBuilder> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Compile the body of a `$` mapping. `path` locates the body in the
    /// condition document for error messages.
    pub fn compile(&self, path: &str, body: &JsonValue) -> Result<ExprFn> {
        let map = body
            .as_object()
            .ok_or_else(|| SelectorError::build(path, "a function expression must be a mapping"))?;

        let mut bag = FunctionBag::default();
        for (key, value) in map {
            bag.insert(key.clone(), self.argument(&format!("{}.{}", path, key), value)?);
        }

        let name = bag
            .keys()
            .find(|key| self.contains(key))
            .map(str::to_string)
            .ok_or_else(|| SelectorError::build(path, "no known function in expression"))?;
        let builder = self
            .get(&name)
            .ok_or_else(|| SelectorError::build(path, format!("unknown function '{}'", name)))?;
        builder(&bag).ok_or_else(|| {
            SelectorError::build(path, format!("invalid arguments for function '{}'", name))
        })
    }

    fn argument(&self, path: &str, value: &JsonValue) -> Result<FnArg> {
        match value {
            JsonValue::Object(map) => {
                let body = match map.get(FUNCTION_KEY) {
                    Some(inner) if map.len() == 1 => inner,
                    _ => value,
                };
                Ok(FnArg::Function(self.compile(path, body)?))
            }
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.argument(&format!("{}[{}]", path, i), item))
                .collect::<Result<Vec<_>>>()
                .map(FnArg::List),
            other => Ok(FnArg::Value(other.clone())),
        }
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl Default for FunctionRegistry {
    /// A registry with every built-in function
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("configuration", configuration);
        registry.register("path", path);
        registry.register("boolean", boolean);
        registry.register("string", string);
        registry.register("integer", integer);
        registry.register("concat", concat);
        registry.register("substring", substring);
        registry.register("replace", replace);
        registry.register("trim", trim);
        registry.register("first", first);
        registry.register("last", last);
        registry.register("split", split);
        registry.register("padLeft", pad_left);
        registry.register("padRight", pad_right);
        registry
    }
}

/// If `value` is a `{ "$": { .. } }` mapping, its body
pub fn function_body(value: &JsonValue) -> Option<&JsonValue> {
    let map = value.as_object()?;
    if map.len() == 1 {
        map.get(FUNCTION_KEY)
    } else {
        None
    }
}

// --- Built-in function implementations ---

fn configuration(bag: &FunctionBag) -> Option<ExprFn> {
    let name = bag.string("configuration")?;
    Some(ExprFn::new(move |scope| {
        scope.configuration(&name).unwrap_or(JsonValue::Null)
    }))
}

fn path(bag: &FunctionBag) -> Option<ExprFn> {
    let program = QueryProgram::compile(&bag.string("path")?).ok()?;
    Some(ExprFn::new(move |scope| {
        scope.query(&program).unwrap_or(JsonValue::Null)
    }))
}

fn boolean(bag: &FunctionBag) -> Option<ExprFn> {
    let next = bag.producer("boolean")?;
    Some(ExprFn::new(move |scope| {
        let value = next.call(scope);
        JsonValue::Bool(scope.coercer().try_bool(&value, true).unwrap_or(false))
    }))
}

fn string(bag: &FunctionBag) -> Option<ExprFn> {
    let next = bag.producer("string")?;
    Some(ExprFn::new(move |scope| {
        let value = next.call(scope);
        scope
            .coercer()
            .try_string_convert(&value, true)
            .map(|s| JsonValue::String(s.into_owned()))
            .unwrap_or(JsonValue::Null)
    }))
}

fn integer(bag: &FunctionBag) -> Option<ExprFn> {
    let next = bag.producer("integer")?;
    Some(ExprFn::new(move |scope| {
        let value = next.call(scope);
        JsonValue::from(scope.coercer().try_int(&value, true).unwrap_or(0))
    }))
}

fn concat(bag: &FunctionBag) -> Option<ExprFn> {
    let values = match bag.get("concat")? {
        FnArg::List(items) => items.clone(),
        FnArg::Value(JsonValue::Array(items)) => items.iter().cloned().map(FnArg::Value).collect(),
        _ => return None,
    };
    Some(ExprFn::new(move |scope| {
        let coercer = scope.coercer();
        let joined: String = values
            .iter()
            .map(|arg| {
                let value = arg.evaluate(scope);
                coercer
                    .try_string_convert(&value, true)
                    .map(|s| s.into_owned())
                    .unwrap_or_default()
            })
            .collect();
        JsonValue::String(joined)
    }))
}

fn substring(bag: &FunctionBag) -> Option<ExprFn> {
    let length = usize::try_from(bag.int(LENGTH)?.max(0)).ok()?;
    let next = bag.producer("substring")?;
    Some(ExprFn::new(move |scope| match next.call(scope) {
        JsonValue::String(s) => JsonValue::String(s.chars().take(length).collect()),
        _ => JsonValue::Null,
    }))
}

fn replace(bag: &FunctionBag) -> Option<ExprFn> {
    let old = bag.string(OLD_STRING)?;
    let new = bag.string(NEW_STRING)?;
    let next = bag.producer("replace")?;
    let case_sensitive = bag.bool(CASE_SENSITIVE).unwrap_or(false);
    let pattern = RegexBuilder::new(&regex::escape(&old))
        .case_insensitive(!case_sensitive)
        .build()
        .ok()?;
    Some(ExprFn::new(move |scope| match next.call(scope) {
        JsonValue::String(s) if s.is_empty() || old.is_empty() => JsonValue::String(s),
        JsonValue::String(s) => JsonValue::String(pattern.replace_all(&s, NoExpand(&new)).into_owned()),
        _ => JsonValue::Null,
    }))
}

fn trim(bag: &FunctionBag) -> Option<ExprFn> {
    let next = bag.producer("trim")?;
    Some(ExprFn::new(move |scope| match next.call(scope) {
        JsonValue::String(s) => JsonValue::String(s.trim().to_string()),
        _ => JsonValue::Null,
    }))
}

fn first(bag: &FunctionBag) -> Option<ExprFn> {
    let next = bag.producer("first")?;
    Some(ExprFn::new(move |scope| match next.call(scope) {
        JsonValue::String(s) => s.chars().next().map(|c| JsonValue::String(c.to_string())).unwrap_or(JsonValue::Null),
        JsonValue::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        _ => JsonValue::Null,
    }))
}

fn last(bag: &FunctionBag) -> Option<ExprFn> {
    let next = bag.producer("last")?;
    Some(ExprFn::new(move |scope| match next.call(scope) {
        JsonValue::String(s) => s.chars().last().map(|c| JsonValue::String(c.to_string())).unwrap_or(JsonValue::Null),
        JsonValue::Array(mut items) => items.pop().unwrap_or(JsonValue::Null),
        _ => JsonValue::Null,
    }))
}

fn split(bag: &FunctionBag) -> Option<ExprFn> {
    let delimiters: Vec<String> = bag
        .string_list(DELIMITER)?
        .into_iter()
        .filter(|d| !d.is_empty())
        .collect();
    let next = bag.producer("split")?;
    Some(ExprFn::new(move |scope| match next.call(scope) {
        JsonValue::String(s) => JsonValue::Array(
            split_any(&s, &delimiters)
                .into_iter()
                .map(|part| JsonValue::String(part.to_string()))
                .collect(),
        ),
        _ => JsonValue::Null,
    }))
}

/// Split at every occurrence of any delimiter, keeping empty segments. At a
/// given position the first listed delimiter that matches wins.
fn split_any<'a>(s: &'a str, delimiters: &[String]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < s.len() {
        if !s.is_char_boundary(i) {
            i += 1;
            continue;
        }
        match delimiters.iter().find(|d| s[i..].starts_with(d.as_str())) {
            Some(d) => {
                parts.push(&s[start..i]);
                i += d.len();
                start = i;
            }
            None => i += 1,
        }
    }
    parts.push(&s[start..]);
    parts
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

fn pad_left(bag: &FunctionBag) -> Option<ExprFn> {
    pad(bag, "padLeft", Side::Left)
}

fn pad_right(bag: &FunctionBag) -> Option<ExprFn> {
    pad(bag, "padRight", Side::Right)
}

fn pad(bag: &FunctionBag, name: &str, side: Side) -> Option<ExprFn> {
    let next = bag.producer(name)?;
    let total = usize::try_from(bag.int(TOTAL_LENGTH).unwrap_or(0).max(0)).unwrap_or(0);
    let padding = bag
        .string(PADDING_CHARACTER)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| " ".to_string());
    Some(ExprFn::new(move |scope| {
        let value = next.call(scope);
        let Some(s) = scope.coercer().try_string_convert(&value, true) else {
            return JsonValue::Null;
        };
        let len = s.chars().count();
        if total <= len {
            return JsonValue::String(s.into_owned());
        }
        let fill: String = padding.chars().cycle().take(total - len).collect();
        JsonValue::String(match side {
            Side::Left => format!("{}{}", fill, s),
            Side::Right => format!("{}{}", s, fill),
        })
    }))
}
