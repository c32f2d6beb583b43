// SPDX-License-Identifier: MIT

//! Compile condition documents into [`ConditionTree`]s
//!
//! A condition is a mapping holding either one combinator key (`allOf`,
//! `anyOf`, `not`, `if`) or exactly one leaf operator key together with an
//! operand (`field`, `name`, `type` or `value`) and optional flags. Operator
//! parameters and `value` may be function expressions written as
//! `{ "$": { ... } }`.

use super::ast::{
    Combinator, ConditionNode, ConditionTree, Leaf, LeafFlags, NodeId, NodeKind, OperandSource,
    Quantifier, SubSelector, ValueSource,
};
use super::operators::{
    CompareOp, Operator, OperatorKind, PatternSource, StringTest, TypeTest, VersionGrammar,
    VersionSource,
};
use crate::coercion::{compile_pattern, Coercer};
use crate::error::{Result, SelectorError};
use crate::functions::{function_body, FunctionRegistry};
use crate::options::Options;
use crate::query::{QueryOptions, QueryProgram, DEFAULT_MAX_DEPTH};
use crate::version::{DateConstraint, SemverConstraint};
use serde_json::{Map, Value as JsonValue};

const FIELD: &str = "field";
const NAME: &str = "name";
const TYPE: &str = "type";
const VALUE: &str = "value";
const WHERE: &str = "where";
const SELF: &str = ".";

/// Quantifier keys, in the order they are checked
const QUANTIFIERS: &[(&str, fn(i64) -> Quantifier)] = &[
    ("greaterOrEqual", Quantifier::GreaterOrEqual),
    ("greaterOrEquals", Quantifier::GreaterOrEqual),
    ("greater", Quantifier::Greater),
    ("lessOrEqual", Quantifier::LessOrEqual),
    ("lessOrEquals", Quantifier::LessOrEqual),
    ("less", Quantifier::Less),
    ("count", Quantifier::Count),
];

/// Compiles condition documents
#[derive(Debug, Clone)]
pub struct SelectorBuilder {
    functions: FunctionRegistry,
    max_depth: usize,
    regex_size_limit: usize,
    coercer: Coercer,
}

impl Default for SelectorBuilder {
    fn default() -> Self {
        Self::new(&Options::default())
    }
}

impl SelectorBuilder {
    pub fn new(options: &Options) -> Self {
        Self {
            functions: FunctionRegistry::default(),
            max_depth: options.execution.max_depth,
            regex_size_limit: options.execution.regex_size_limit,
            coercer: options.coercer(),
        }
    }

    /// Replace the function registry, e.g. to add host functions
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = if max_depth == 0 { DEFAULT_MAX_DEPTH } else { max_depth };
        self
    }

    /// Settings used to compile `field` paths
    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            max_depth: self.max_depth,
            coercer: self.coercer,
            regex_size_limit: self.regex_size_limit,
            ..Default::default()
        }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Compile a condition from YAML (or JSON) text
    pub fn build_yaml(&self, text: &str) -> Result<ConditionTree> {
        let condition: JsonValue = serde_yaml::from_str(text)?;
        self.build(&condition)
    }

    pub fn build(&self, condition: &JsonValue) -> Result<ConditionTree> {
        let mut compiler = Compiler {
            builder: self,
            nodes: Vec::new(),
        };
        let root = compiler.node("", condition, 1)?;
        log::debug!("built condition with {} nodes", compiler.nodes.len());
        Ok(ConditionTree::new(compiler.nodes, root))
    }
}

struct Compiler<'b> {
    builder: &'b SelectorBuilder,
    nodes: Vec<ConditionNode>,
}

impl Compiler<'_> {
    fn push(&mut self, path: String, kind: NodeKind) -> NodeId {
        self.nodes.push(ConditionNode { path, kind });
        self.nodes.len() - 1
    }

    fn node(&mut self, location: &str, value: &JsonValue, depth: usize) -> Result<NodeId> {
        if depth > self.builder.max_depth {
            return Err(error(
                location,
                format!("conditions are nested deeper than {}", self.builder.max_depth),
            ));
        }
        let Some(map) = value.as_object() else {
            return Err(error(location, "expected a mapping"));
        };

        let mut combinators = map
            .iter()
            .filter_map(|(key, value)| Combinator::from_key(key).map(|c| (c, value)));
        match (combinators.next(), combinators.next()) {
            (Some((kind, children)), None) => self.combinator(location, map, kind, children, depth),
            (Some(_), Some(_)) => Err(error(location, "expected a single combinator")),
            (None, _) => self.leaf(location, map),
        }
    }

    fn combinator(
        &mut self,
        location: &str,
        map: &Map<String, JsonValue>,
        kind: Combinator,
        children: &JsonValue,
        depth: usize,
    ) -> Result<NodeId> {
        let path = format!("{}.{}", location, kind.name());
        let items: Vec<&JsonValue> = match children {
            JsonValue::Array(items) if !kind.is_unary() || items.len() == 1 => items.iter().collect(),
            JsonValue::Object(_) if kind.is_unary() => vec![children],
            JsonValue::Null if kind == Combinator::If => Vec::new(),
            _ if kind.is_unary() => return Err(error(&path, "expected a single condition")),
            _ => return Err(error(&path, "expected a sequence of conditions")),
        };

        let mut ids = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            ids.push(self.node(&format!("{}[{}]", path, i), item, depth + 1)?);
        }

        let sub = match lookup(map, FIELD) {
            Some(field) => Some(self.sub_selector(&path, map, field, depth)?),
            None => None,
        };
        Ok(self.push(path, NodeKind::Combinator { kind, children: ids, sub }))
    }

    fn sub_selector(
        &mut self,
        path: &str,
        map: &Map<String, JsonValue>,
        field: &JsonValue,
        depth: usize,
    ) -> Result<SubSelector> {
        let field = self.field(path, field)?;
        let filter = match lookup(map, WHERE) {
            Some(condition) => Some(self.node(&format!("{}.{}", path, WHERE), condition, depth + 1)?),
            None => None,
        };
        let mut quantifier = None;
        for (key, make) in QUANTIFIERS {
            if let Some(value) = lookup(map, key) {
                let n = self
                    .builder
                    .coercer
                    .try_long(value, true)
                    .ok_or_else(|| error(path, format!("'{}' expects an integer", key)))?;
                quantifier = Some(make(n));
                break;
            }
        }
        Ok(SubSelector {
            field,
            filter,
            quantifier,
        })
    }

    fn leaf(&mut self, location: &str, map: &Map<String, JsonValue>) -> Result<NodeId> {
        let mut operators = map
            .iter()
            .filter_map(|(key, value)| OperatorKind::from_key(key).map(|kind| (kind, key, value)));
        let (kind, key, param) = match (operators.next(), operators.next()) {
            (Some(op), None) => op,
            (Some(_), Some(_)) => return Err(error(location, "expected a single operator")),
            (None, _) => return Err(error(location, "expected a combinator or an operator")),
        };
        let path = format!("{}.{}", location, key);

        let flags = self.flags(&path, map)?;
        let operand = self.operand(&path, map)?;
        if kind.requires_field() && !matches!(operand, Some(OperandSource::Field(_))) {
            return Err(error(&path, format!("'{}' requires 'field'", key)));
        }

        let operator = self.operator(&path, kind, param, flags)?;
        let path = format!("{}.{}", location, operator.name());
        Ok(self.push(
            path,
            NodeKind::Leaf(Leaf {
                operator,
                operand,
                flags,
            }),
        ))
    }

    fn field(&self, path: &str, value: &JsonValue) -> Result<QueryProgram> {
        let source = value
            .as_str()
            .ok_or_else(|| error(path, "'field' expects a string"))?;
        QueryProgram::compile_with(source, &self.builder.query_options()).map_err(|e| error(path, e.to_string()))
    }

    fn operand(&self, path: &str, map: &Map<String, JsonValue>) -> Result<Option<OperandSource>> {
        if let Some(field) = lookup(map, FIELD) {
            return Ok(Some(OperandSource::Field(self.field(path, field)?)));
        }
        for (key, source) in [(TYPE, OperandSource::Type), (NAME, OperandSource::Name)] {
            if let Some(value) = lookup(map, key) {
                if value.as_str() != Some(SELF) {
                    return Err(error(path, format!("'{}' only accepts '{}'", key, SELF)));
                }
                return Ok(Some(source));
            }
        }
        match lookup(map, VALUE) {
            Some(value) => Ok(Some(OperandSource::Value(self.value(path, value)?))),
            None => Ok(None),
        }
    }

    fn flags(&self, path: &str, map: &Map<String, JsonValue>) -> Result<LeafFlags> {
        let flag = |key: &str| -> Result<bool> {
            match lookup(map, key) {
                None => Ok(false),
                Some(value) => self
                    .builder
                    .coercer
                    .try_bool(value, true)
                    .ok_or_else(|| error(path, format!("'{}' expects a boolean", key))),
            }
        };
        Ok(LeafFlags {
            case_sensitive: flag("caseSensitive")?,
            convert: flag("convert")?,
            unique: flag("unique")?,
            ignore_scheme: flag("ignoreScheme")?,
            include_prerelease: flag("includePrerelease")?,
            require_letters: flag("requireLetters")?,
        })
    }

    fn value(&self, path: &str, value: &JsonValue) -> Result<ValueSource> {
        match function_body(value) {
            Some(body) => Ok(ValueSource::Function(self.builder.functions.compile(path, body)?)),
            None => Ok(ValueSource::Literal(value.clone())),
        }
    }

    fn operator(&self, path: &str, kind: OperatorKind, param: &JsonValue, flags: LeafFlags) -> Result<Operator> {
        let operator = match kind {
            OperatorKind::Exists => Operator::Exists(self.boolean(path, param)?),
            OperatorKind::Equals => Operator::Equals(self.value(path, param)?),
            OperatorKind::NotEquals => Operator::NotEquals(self.value(path, param)?),
            OperatorKind::HasDefault => Operator::HasDefault(self.value(path, param)?),
            OperatorKind::HasValue => Operator::HasValue(self.boolean(path, param)?),
            OperatorKind::Match => Operator::Match(self.pattern(path, param, flags)?),
            OperatorKind::NotMatch => Operator::NotMatch(self.pattern(path, param, flags)?),
            OperatorKind::In => Operator::In(array(path, param)?),
            OperatorKind::NotIn => Operator::NotIn(array(path, param)?),
            OperatorKind::SetOf => Operator::SetOf(array(path, param)?),
            OperatorKind::Subset => Operator::Subset(array(path, param)?),
            OperatorKind::Count => Operator::Count(self.integer(path, param)?),
            OperatorKind::NotCount => Operator::NotCount(self.integer(path, param)?),
            OperatorKind::Less => Operator::Compare(CompareOp::Less, self.integer(path, param)?),
            OperatorKind::LessOrEquals => Operator::Compare(CompareOp::LessOrEquals, self.integer(path, param)?),
            OperatorKind::Greater => Operator::Compare(CompareOp::Greater, self.integer(path, param)?),
            OperatorKind::GreaterOrEquals => {
                Operator::Compare(CompareOp::GreaterOrEquals, self.integer(path, param)?)
            }
            OperatorKind::StartsWith => string_test(path, StringTest::StartsWith, false, param)?,
            OperatorKind::NotStartsWith => string_test(path, StringTest::StartsWith, true, param)?,
            OperatorKind::EndsWith => string_test(path, StringTest::EndsWith, false, param)?,
            OperatorKind::NotEndsWith => string_test(path, StringTest::EndsWith, true, param)?,
            OperatorKind::Contains => string_test(path, StringTest::Contains, false, param)?,
            OperatorKind::NotContains => string_test(path, StringTest::Contains, true, param)?,
            OperatorKind::Like => string_test(path, StringTest::Like, false, param)?,
            OperatorKind::NotLike => string_test(path, StringTest::Like, true, param)?,
            OperatorKind::IsString => Operator::TypeTest(TypeTest::String, self.boolean(path, param)?),
            OperatorKind::IsArray => Operator::TypeTest(TypeTest::Array, self.boolean(path, param)?),
            OperatorKind::IsBoolean => Operator::TypeTest(TypeTest::Boolean, self.boolean(path, param)?),
            OperatorKind::IsDateTime => Operator::TypeTest(TypeTest::DateTime, self.boolean(path, param)?),
            OperatorKind::IsInteger => Operator::TypeTest(TypeTest::Integer, self.boolean(path, param)?),
            OperatorKind::IsNumeric => Operator::TypeTest(TypeTest::Numeric, self.boolean(path, param)?),
            OperatorKind::IsLower => Operator::TypeTest(TypeTest::Lower, self.boolean(path, param)?),
            OperatorKind::IsUpper => Operator::TypeTest(TypeTest::Upper, self.boolean(path, param)?),
            OperatorKind::HasSchema => Operator::HasSchema(strings(path, param)?),
            OperatorKind::Version => Operator::Version(self.version(path, VersionGrammar::Semantic, param, flags)?),
            OperatorKind::ApiVersion => Operator::Version(self.version(path, VersionGrammar::Date, param, flags)?),
        };
        Ok(operator)
    }

    fn boolean(&self, path: &str, param: &JsonValue) -> Result<bool> {
        self.builder
            .coercer
            .try_bool(param, true)
            .ok_or_else(|| error(path, "expected a boolean"))
    }

    /// An integer parameter; function results are checked when evaluated
    fn integer(&self, path: &str, param: &JsonValue) -> Result<ValueSource> {
        let source = self.value(path, param)?;
        if let ValueSource::Literal(value) = &source {
            if self.builder.coercer.try_long(value, true).is_none() {
                return Err(error(path, "expected an integer"));
            }
        }
        Ok(source)
    }

    fn pattern(&self, path: &str, param: &JsonValue, flags: LeafFlags) -> Result<PatternSource> {
        if let Some(body) = function_body(param) {
            return Ok(PatternSource::Dynamic(self.builder.functions.compile(path, body)?));
        }
        let pattern = param
            .as_str()
            .ok_or_else(|| error(path, "expected a regular expression"))?;
        compile_pattern(pattern, flags.case_sensitive, self.builder.regex_size_limit)
            .map(PatternSource::Compiled)
            .map_err(|e| error(path, format!("invalid regular expression '{}': {}", pattern, e)))
    }

    fn version(
        &self,
        path: &str,
        grammar: VersionGrammar,
        param: &JsonValue,
        flags: LeafFlags,
    ) -> Result<VersionSource> {
        if let Some(body) = function_body(param) {
            return Ok(VersionSource::Dynamic(grammar, self.builder.functions.compile(path, body)?));
        }
        let constraint = param
            .as_str()
            .ok_or_else(|| error(path, "expected a version constraint"))?;
        let source = match grammar {
            VersionGrammar::Semantic => {
                VersionSource::Semantic(SemverConstraint::parse(constraint, flags.include_prerelease)?)
            }
            VersionGrammar::Date => {
                VersionSource::Date(DateConstraint::parse(constraint, flags.include_prerelease)?)
            }
        };
        Ok(source)
    }
}

fn error(path: &str, message: impl Into<String>) -> SelectorError {
    let path = if path.is_empty() { "." } else { path };
    SelectorError::build(path, message)
}

/// Case-insensitive key lookup
fn lookup<'m>(map: &'m Map<String, JsonValue>, key: &str) -> Option<&'m JsonValue> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn array(path: &str, param: &JsonValue) -> Result<Vec<JsonValue>> {
    param
        .as_array()
        .cloned()
        .ok_or_else(|| error(path, "expected a sequence of values"))
}

/// A string or a sequence of strings
fn strings(path: &str, param: &JsonValue) -> Result<Vec<String>> {
    match param {
        JsonValue::String(s) => Ok(vec![s.clone()]),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| error(path, "expected a sequence of strings"))
            })
            .collect(),
        _ => Err(error(path, "expected a string or a sequence of strings")),
    }
}

fn string_test(path: &str, test: StringTest, negate: bool, param: &JsonValue) -> Result<Operator> {
    Ok(Operator::StringTest {
        test,
        negate,
        values: strings(path, param)?,
    })
}
