// SPDX-License-Identifier: MIT

//! Leaf operator catalogue
//!
//! Every leaf takes an operand (a field, the bound name or type, or a value)
//! and tests it. A failing leaf usually records a [`Reason`]. Operands that
//! cannot be resolved, or parameters that do not fit the value, simply do not
//! match.
//!
//! [`Reason`]: super::reason::Reason

use super::ast::{Leaf, LeafFlags, OperandSource, ValueSource};
use super::context::{EvaluationContext, Operand, OperandValue};
use super::reason::OperandKind;
use crate::binder::Bindable;
use crate::coercion::{self, enumerable_len, null_or_empty, Coercer};
use crate::error::{Result, SelectorError};
use crate::functions::ExprFn;
use crate::version::{DateConstraint, DateVersion, SemanticVersion, SemverConstraint};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Names of the leaf operators, as written in condition documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Exists,
    Equals,
    NotEquals,
    HasDefault,
    HasValue,
    Match,
    NotMatch,
    In,
    NotIn,
    SetOf,
    Subset,
    Count,
    NotCount,
    Less,
    LessOrEquals,
    Greater,
    GreaterOrEquals,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Contains,
    NotContains,
    Like,
    NotLike,
    IsString,
    IsArray,
    IsBoolean,
    IsDateTime,
    IsInteger,
    IsNumeric,
    IsLower,
    IsUpper,
    HasSchema,
    Version,
    ApiVersion,
}

const CATALOGUE: &[(&str, OperatorKind)] = &[
    ("exists", OperatorKind::Exists),
    ("equals", OperatorKind::Equals),
    ("notEquals", OperatorKind::NotEquals),
    ("hasDefault", OperatorKind::HasDefault),
    ("hasValue", OperatorKind::HasValue),
    ("match", OperatorKind::Match),
    ("notMatch", OperatorKind::NotMatch),
    ("in", OperatorKind::In),
    ("notIn", OperatorKind::NotIn),
    ("setOf", OperatorKind::SetOf),
    ("subset", OperatorKind::Subset),
    ("count", OperatorKind::Count),
    ("notCount", OperatorKind::NotCount),
    ("less", OperatorKind::Less),
    ("lessOrEquals", OperatorKind::LessOrEquals),
    ("lessOrEqual", OperatorKind::LessOrEquals),
    ("greater", OperatorKind::Greater),
    ("greaterOrEquals", OperatorKind::GreaterOrEquals),
    ("greaterOrEqual", OperatorKind::GreaterOrEquals),
    ("startsWith", OperatorKind::StartsWith),
    ("notStartsWith", OperatorKind::NotStartsWith),
    ("endsWith", OperatorKind::EndsWith),
    ("notEndsWith", OperatorKind::NotEndsWith),
    ("contains", OperatorKind::Contains),
    ("notContains", OperatorKind::NotContains),
    ("like", OperatorKind::Like),
    ("notLike", OperatorKind::NotLike),
    ("isString", OperatorKind::IsString),
    ("isArray", OperatorKind::IsArray),
    ("isBoolean", OperatorKind::IsBoolean),
    ("isDateTime", OperatorKind::IsDateTime),
    ("isInteger", OperatorKind::IsInteger),
    ("isNumeric", OperatorKind::IsNumeric),
    ("isLower", OperatorKind::IsLower),
    ("isUpper", OperatorKind::IsUpper),
    ("hasSchema", OperatorKind::HasSchema),
    ("hasAnySchema", OperatorKind::HasSchema),
    ("version", OperatorKind::Version),
    ("apiVersion", OperatorKind::ApiVersion),
];

impl OperatorKind {
    /// Look up an operator key, ignoring case
    pub fn from_key(key: &str) -> Option<Self> {
        CATALOGUE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, kind)| *kind)
    }

    /// Operators that only read a `field`
    pub fn requires_field(&self) -> bool {
        matches!(
            self,
            OperatorKind::Exists | OperatorKind::SetOf | OperatorKind::Subset | OperatorKind::HasSchema
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEquals,
    Greater,
    GreaterOrEquals,
}

impl CompareOp {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEquals => ordering != Ordering::Greater,
            CompareOp::Greater => ordering == Ordering::Greater,
            CompareOp::GreaterOrEquals => ordering != Ordering::Less,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::LessOrEquals => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEquals => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringTest {
    StartsWith,
    EndsWith,
    Contains,
    Like,
}

impl StringTest {
    fn test(&self, value: &str, pattern: &str, case_sensitive: bool) -> bool {
        match self {
            StringTest::StartsWith => coercion::starts_with(value, pattern, case_sensitive),
            StringTest::EndsWith => coercion::ends_with(value, pattern, case_sensitive),
            StringTest::Contains => coercion::contains(value, pattern, case_sensitive),
            StringTest::Like => coercion::like(value, pattern, case_sensitive),
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            StringTest::StartsWith => "start with",
            StringTest::EndsWith => "end with",
            StringTest::Contains => "contain",
            StringTest::Like => "match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTest {
    String,
    Array,
    Boolean,
    DateTime,
    Integer,
    Numeric,
    Lower,
    Upper,
}

/// A regular expression known when building, or produced per target
#[derive(Debug, Clone)]
pub enum PatternSource {
    Compiled(Regex),
    Dynamic(ExprFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGrammar {
    Semantic,
    Date,
}

#[derive(Debug, Clone)]
pub enum VersionSource {
    Semantic(SemverConstraint),
    Date(DateConstraint),
    /// Constraint text produced by a function; an invalid constraint is a
    /// configuration error at evaluation time
    Dynamic(VersionGrammar, ExprFn),
}

/// A leaf operator with its parameters
#[derive(Debug, Clone)]
pub enum Operator {
    Exists(bool),
    Equals(ValueSource),
    NotEquals(ValueSource),
    HasDefault(ValueSource),
    HasValue(bool),
    Match(PatternSource),
    NotMatch(PatternSource),
    In(Vec<JsonValue>),
    NotIn(Vec<JsonValue>),
    SetOf(Vec<JsonValue>),
    Subset(Vec<JsonValue>),
    Count(ValueSource),
    NotCount(ValueSource),
    Compare(CompareOp, ValueSource),
    StringTest {
        test: StringTest,
        negate: bool,
        values: Vec<String>,
    },
    TypeTest(TypeTest, bool),
    HasSchema(Vec<String>),
    Version(VersionSource),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Exists(_) => "exists",
            Operator::Equals(_) => "equals",
            Operator::NotEquals(_) => "notEquals",
            Operator::HasDefault(_) => "hasDefault",
            Operator::HasValue(_) => "hasValue",
            Operator::Match(_) => "match",
            Operator::NotMatch(_) => "notMatch",
            Operator::In(_) => "in",
            Operator::NotIn(_) => "notIn",
            Operator::SetOf(_) => "setOf",
            Operator::Subset(_) => "subset",
            Operator::Count(_) => "count",
            Operator::NotCount(_) => "notCount",
            Operator::Compare(CompareOp::Less, _) => "less",
            Operator::Compare(CompareOp::LessOrEquals, _) => "lessOrEquals",
            Operator::Compare(CompareOp::Greater, _) => "greater",
            Operator::Compare(CompareOp::GreaterOrEquals, _) => "greaterOrEquals",
            Operator::StringTest { test, negate, .. } => match (test, negate) {
                (StringTest::StartsWith, false) => "startsWith",
                (StringTest::StartsWith, true) => "notStartsWith",
                (StringTest::EndsWith, false) => "endsWith",
                (StringTest::EndsWith, true) => "notEndsWith",
                (StringTest::Contains, false) => "contains",
                (StringTest::Contains, true) => "notContains",
                (StringTest::Like, false) => "like",
                (StringTest::Like, true) => "notLike",
            },
            Operator::TypeTest(test, _) => match test {
                TypeTest::String => "isString",
                TypeTest::Array => "isArray",
                TypeTest::Boolean => "isBoolean",
                TypeTest::DateTime => "isDateTime",
                TypeTest::Integer => "isInteger",
                TypeTest::Numeric => "isNumeric",
                TypeTest::Lower => "isLower",
                TypeTest::Upper => "isUpper",
            },
            Operator::HasSchema(_) => "hasSchema",
            Operator::Version(VersionSource::Date(_))
            | Operator::Version(VersionSource::Dynamic(VersionGrammar::Date, _)) => "apiVersion",
            Operator::Version(_) => "version",
        }
    }

    /// Operators that pass when their field does not resolve
    fn passes_when_missing(&self) -> bool {
        matches!(
            self,
            Operator::NotEquals(_)
                | Operator::NotMatch(_)
                | Operator::NotIn(_)
                | Operator::HasDefault(_)
                | Operator::HasValue(false)
        )
    }
}

/// Outcome of testing one operand
enum Verdict {
    Pass,
    Fail(String),
    /// The parameters do not apply to this value; no reason is recorded
    Invalid,
}

impl Verdict {
    fn check(condition: bool, message: impl FnOnce() -> String) -> Self {
        if condition {
            Verdict::Pass
        } else {
            Verdict::Fail(message())
        }
    }
}

/// Evaluate a leaf against the current value of `ctx`
pub(crate) fn evaluate_leaf<T: Bindable>(leaf: &Leaf, ctx: &mut EvaluationContext<'_, T>) -> Result<bool> {
    if let Operator::Exists(expected) = &leaf.operator {
        return Ok(exists(leaf, *expected, ctx));
    }

    if leaf.operator.passes_when_missing() {
        if let Some(program) = leaf.field() {
            if ctx.resolve(program).is_none() {
                log::debug!("{}: the field '{}' was not found", leaf.operator.name(), program.source());
                return Ok(true);
            }
        }
    }

    let Some(operand) = operand(leaf, ctx) else {
        return Ok(false);
    };

    let verdict = match &operand.value {
        OperandValue::Target(value) => test(leaf, *value, &operand, ctx)?,
        OperandValue::Owned(value) => test(leaf, value, &operand, ctx)?,
    };
    Ok(match verdict {
        Verdict::Pass => true,
        Verdict::Fail(message) => {
            ctx.reason(operand.kind, &operand.path, message);
            false
        }
        Verdict::Invalid => false,
    })
}

fn exists<T: Bindable>(leaf: &Leaf, expected: bool, ctx: &mut EvaluationContext<'_, T>) -> bool {
    let Some(program) = leaf.field() else {
        return false;
    };
    let found = ctx.resolve(program).is_some();
    if found == expected {
        return true;
    }
    let field = program.source();
    let message = if expected {
        format!("The field '{}' does not exist.", field)
    } else {
        format!("The field '{}' exists.", field)
    };
    ctx.reason(OperandKind::Path, field, message);
    false
}

/// Resolve the operand of a leaf. A missing field records a reason.
fn operand<'a, T: Bindable>(leaf: &Leaf, ctx: &mut EvaluationContext<'a, T>) -> Option<Operand<'a, T>> {
    match leaf.operand.as_ref()? {
        OperandSource::Field(program) => ctx.field(program),
        OperandSource::Name => ctx.bind_name().map(|(name, path)| Operand {
            kind: OperandKind::Name,
            path,
            value: OperandValue::Owned(JsonValue::String(name)),
        }),
        OperandSource::Type => ctx.bind_type().map(|(ty, path)| Operand {
            kind: OperandKind::Type,
            path,
            value: OperandValue::Owned(JsonValue::String(ty)),
        }),
        OperandSource::Value(source) => {
            let value = source.resolve(&*ctx).into_owned();
            Some(Operand {
                kind: OperandKind::Value,
                path: String::new(),
                value: OperandValue::Owned(value),
            })
        }
    }
}

fn test<T: Bindable, V: Bindable>(
    leaf: &Leaf,
    value: &V,
    operand: &Operand<'_, T>,
    ctx: &mut EvaluationContext<'_, T>,
) -> Result<Verdict> {
    let flags = leaf.flags;
    let coercer = ctx.query_options().coercer;
    let verdict = match &leaf.operator {
        Operator::Exists(_) => Verdict::Invalid,
        Operator::Equals(expected) => {
            let expected = expected.resolve(&*ctx);
            Verdict::check(
                coercer.equal(&*expected, value, flags.case_sensitive, true, flags.convert),
                || is_set_to(value),
            )
        }
        Operator::NotEquals(expected) => {
            let expected = expected.resolve(&*ctx);
            Verdict::check(
                !coercer.equal(&*expected, value, flags.case_sensitive, true, flags.convert),
                || is_set_to(value),
            )
        }
        Operator::HasDefault(expected) => {
            let expected = expected.resolve(&*ctx);
            Verdict::check(
                coercer.equal(&*expected, value, flags.case_sensitive, true, false),
                || is_set_to(value),
            )
        }
        Operator::HasValue(expected) => {
            Verdict::check(*expected != null_or_empty(Some(value)), || is_set_to(value))
        }
        Operator::Match(pattern) => match_pattern(pattern, value, flags, ctx, false),
        Operator::NotMatch(pattern) => match_pattern(pattern, value, flags, ctx, true),
        Operator::In(set) => Verdict::check(
            set.iter()
                .any(|expected| coercer.any_value(value, expected, flags.case_sensitive)),
            || {
                format!(
                    "The value '{}' was not included in the set {}.",
                    display(value),
                    join_quoted(set.iter().map(display))
                )
            },
        ),
        Operator::NotIn(set) => Verdict::check(
            !set
                .iter()
                .any(|expected| coercer.any_value(value, expected, flags.case_sensitive)),
            || is_set_to(value),
        ),
        Operator::SetOf(expected) => set_of(expected, value, operand, flags, coercer),
        Operator::Subset(expected) => subset(expected, value, operand, flags, coercer),
        Operator::Count(expected) | Operator::NotCount(expected) => {
            let negate = matches!(leaf.operator, Operator::NotCount(_));
            let expected = expected.resolve(&*ctx);
            match coercer.try_long(&*expected, true) {
                None => Verdict::Invalid,
                Some(_) if value.is_null() => Verdict::Fail("The value is null.".to_string()),
                Some(expected) => count(value, expected, negate),
            }
        }
        Operator::Compare(op, expected) => {
            let expected = expected.resolve(&*ctx);
            match coercer.try_long(&*expected, true) {
                None => Verdict::Invalid,
                Some(expected) => compare(*op, value, expected, flags, coercer),
            }
        }
        Operator::StringTest { test, negate, values } => {
            string_test(*test, *negate, values, value, flags, coercer)
        }
        Operator::TypeTest(test, expected) => type_test(*test, *expected, value, flags, coercer),
        Operator::HasSchema(expected) => has_schema(expected, value, flags, operand, ctx),
        Operator::Version(source) => return version(source, value, flags, ctx),
    };
    Ok(verdict)
}

fn match_pattern<T: Bindable, V: Bindable>(
    pattern: &PatternSource,
    value: &V,
    flags: LeafFlags,
    ctx: &mut EvaluationContext<'_, T>,
    negate: bool,
) -> Verdict {
    let regex = match pattern {
        PatternSource::Compiled(regex) => regex.clone(),
        PatternSource::Dynamic(f) => {
            let produced = f.call(&*ctx);
            let Some(text) = produced.as_str() else {
                return Verdict::Invalid;
            };
            match ctx.pattern(text, flags.case_sensitive) {
                Some(regex) => regex,
                None => return Verdict::Invalid,
            }
        }
    };
    let matched = value.as_str().is_some_and(|s| regex.is_match(s));
    if matched != negate {
        return Verdict::Pass;
    }
    let verb = if negate { "matches" } else { "does not match" };
    Verdict::Fail(format!(
        "The value '{}' {} the pattern '{}'.",
        display(value),
        verb,
        regex.as_str()
    ))
}

fn set_of<T, V: Bindable>(
    expected: &[JsonValue],
    value: &V,
    operand: &Operand<'_, T>,
    flags: LeafFlags,
    coercer: Coercer,
) -> Verdict {
    let field = &operand.path;
    let Some(len) = enumerable_len(value) else {
        return Verdict::Fail(format!("The field '{}' is not enumerable.", field));
    };
    if len != expected.len() {
        return Verdict::Fail(format!(
            "The field '{}' has {} items instead of {}.",
            field,
            len,
            expected.len()
        ));
    }
    for item in expected {
        if !coercer.any_value(value, item, flags.case_sensitive) {
            return Verdict::Fail(format!("The field '{}' did not include '{}'.", field, display(item)));
        }
    }
    Verdict::Pass
}

fn subset<T, V: Bindable>(
    expected: &[JsonValue],
    value: &V,
    operand: &Operand<'_, T>,
    flags: LeafFlags,
    coercer: Coercer,
) -> Verdict {
    let field = &operand.path;
    if enumerable_len(value).is_none() {
        return Verdict::Fail(format!("The field '{}' is not enumerable.", field));
    }
    for item in expected {
        match coercer.count_value(value, item, flags.case_sensitive) {
            0 => {
                return Verdict::Fail(format!("The field '{}' did not include '{}'.", field, display(item)))
            }
            n if n > 1 && flags.unique => {
                return Verdict::Fail(format!(
                    "The field '{}' included multiple instances of '{}'.",
                    field,
                    display(item)
                ))
            }
            _ => {}
        }
    }
    Verdict::Pass
}

fn count<V: Bindable>(value: &V, expected: i64, negate: bool) -> Verdict {
    let actual = enumerable_len(value).map(|len| len as i64);
    match (actual, negate) {
        (Some(actual), false) if actual == expected => Verdict::Pass,
        (Some(actual), true) if actual != expected => Verdict::Pass,
        (actual, false) => Verdict::Fail(format!(
            "The value has {} items instead of {}.",
            actual.unwrap_or(0),
            expected
        )),
        (actual, true) => Verdict::Fail(format!(
            "The value should not have {} items.",
            actual.unwrap_or(0)
        )),
    }
}

fn compare<V: Bindable>(op: CompareOp, value: &V, expected: i64, flags: LeafFlags, coercer: Coercer) -> Verdict {
    if value.is_null() {
        return Verdict::check(op.accepts(0.cmp(&expected)), || {
            "The value is null or empty.".to_string()
        });
    }
    let Some(ordering) = coercer.compare_numeric(value, &JsonValue::from(expected), flags.convert) else {
        return Verdict::Invalid;
    };
    Verdict::check(op.accepts(ordering), || {
        format!(
            "The value '{}' was not {} {}.",
            display(value),
            op.symbol(),
            expected
        )
    })
}

fn string_test<V: Bindable>(
    test: StringTest,
    negate: bool,
    patterns: &[String],
    value: &V,
    flags: LeafFlags,
    coercer: Coercer,
) -> Verdict {
    let candidates = if test == StringTest::Like {
        coercer
            .try_string_convert(value, flags.convert)
            .map(|s| vec![s.into_owned()])
    } else {
        coercer.try_string_or_array(value, flags.convert)
    };
    let Some(candidates) = candidates else {
        return if negate {
            Verdict::Pass
        } else {
            Verdict::Fail(not_a_string(value))
        };
    };

    let hit = patterns.iter().find_map(|pattern| {
        candidates
            .iter()
            .find(|candidate| test.test(candidate, pattern, flags.case_sensitive))
            .map(|candidate| (candidate, pattern))
    });
    match (hit, negate) {
        (Some(_), false) | (None, true) => Verdict::Pass,
        (None, false) => Verdict::Fail(format!(
            "The value {} does not {} {}.",
            join_quoted(candidates.iter().cloned()),
            test.verb(),
            join_quoted(patterns.iter().cloned())
        )),
        (Some((candidate, pattern)), true) => Verdict::Fail(format!(
            "The value '{}' does {} '{}'.",
            candidate,
            test.verb(),
            pattern
        )),
    }
}

fn type_test<V: Bindable>(test: TypeTest, expected: bool, value: &V, flags: LeafFlags, coercer: Coercer) -> Verdict {
    let (actual, noun) = match test {
        TypeTest::String => (value.as_str().is_some(), "a string"),
        TypeTest::Array => (value.is_array(), "an array"),
        TypeTest::Boolean => (coercer.try_bool(value, flags.convert).is_some(), "a boolean"),
        TypeTest::DateTime => (coercer.try_datetime(value, flags.convert).is_some(), "a date"),
        TypeTest::Integer => (coercer.try_long(value, flags.convert).is_some(), "an integer"),
        TypeTest::Numeric => (
            coercer.try_long(value, flags.convert).is_some()
                || coercer.try_float(value, flags.convert).is_some(),
            "numeric",
        ),
        TypeTest::Lower | TypeTest::Upper => {
            let Some(s) = value.as_str() else {
                return Verdict::check(!expected, || not_a_string(value));
            };
            if test == TypeTest::Lower {
                (coercion::is_lower(s, flags.require_letters), "lowercase")
            } else {
                (coercion::is_upper(s, flags.require_letters), "uppercase")
            }
        }
    };
    Verdict::check(actual == expected, || {
        let not = if expected { " not" } else { "" };
        format!("The value '{}' is{} {}.", display(value), not, noun)
    })
}

const SCHEMA_FIELD: &str = "$schema";

fn has_schema<T: Bindable, V: Bindable>(
    expected: &[String],
    value: &V,
    flags: LeafFlags,
    operand: &Operand<'_, T>,
    ctx: &mut EvaluationContext<'_, T>,
) -> Verdict {
    let Some(schema) = value.try_get_field(SCHEMA_FIELD, false) else {
        ctx.not_has_field(SCHEMA_FIELD);
        return Verdict::Invalid;
    };
    let Some(actual) = schema.as_str() else {
        ctx.reason(OperandKind::Path, SCHEMA_FIELD, not_a_string(schema));
        return Verdict::Invalid;
    };
    if actual.is_empty() {
        ctx.reason(OperandKind::Path, SCHEMA_FIELD, "The value is null or empty.".to_string());
        return Verdict::Invalid;
    }
    if expected.is_empty()
        || coercion::any_schema(actual, expected, flags.ignore_scheme, flags.case_sensitive)
    {
        return Verdict::Pass;
    }
    log::debug!("{}: schema '{}' not in the expected set", operand.path, actual);
    Verdict::Fail(format!("The schema '{}' is not a specified schema.", actual))
}

fn version<T: Bindable, V: Bindable>(
    source: &VersionSource,
    value: &V,
    flags: LeafFlags,
    ctx: &mut EvaluationContext<'_, T>,
) -> Result<Verdict> {
    let Some(text) = value.as_str() else {
        return Ok(Verdict::Fail(not_a_string(value)));
    };
    let invalid = || Verdict::Fail(format!("The version '{}' is not a valid version.", text));
    let grammar = match source {
        VersionSource::Semantic(_) | VersionSource::Dynamic(VersionGrammar::Semantic, _) => VersionGrammar::Semantic,
        _ => VersionGrammar::Date,
    };

    let dynamic = match source {
        VersionSource::Dynamic(_, f) => {
            let produced = f.call(&*ctx);
            let constraint = produced.as_str().map(str::to_string).ok_or_else(|| {
                SelectorError::config(format!("the version constraint '{}' is not valid", produced))
            })?;
            Some(constraint)
        }
        _ => None,
    };

    match grammar {
        VersionGrammar::Semantic => {
            let Ok(actual) = SemanticVersion::parse(text) else {
                return Ok(invalid());
            };
            let constraint = match (source, dynamic) {
                (VersionSource::Semantic(c), _) => c.clone(),
                (_, Some(text)) => SemverConstraint::parse(&text, flags.include_prerelease)
                    .map_err(|e| SelectorError::config(e.to_string()))?,
                _ => return Ok(Verdict::Invalid),
            };
            Ok(Verdict::check(constraint.accepts(&actual), || {
                format!("The version '{}' does not match the constraint '{}'.", actual, constraint)
            }))
        }
        VersionGrammar::Date => {
            let Ok(actual) = DateVersion::parse(text) else {
                return Ok(invalid());
            };
            let constraint = match (source, dynamic) {
                (VersionSource::Date(c), _) => c.clone(),
                (_, Some(text)) => DateConstraint::parse(&text, flags.include_prerelease)
                    .map_err(|e| SelectorError::config(e.to_string()))?,
                _ => return Ok(Verdict::Invalid),
            };
            Ok(Verdict::check(constraint.accepts(&actual), || {
                format!("The version '{}' does not match the constraint '{}'.", actual, constraint)
            }))
        }
    }
}

/// Text of a value for messages: strings unquoted, everything else as JSON
fn display<V: Bindable>(value: &V) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_json().to_string(),
    }
}

fn join_quoted(items: impl Iterator<Item = String>) -> String {
    let items: Vec<String> = items.map(|s| format!("'{}'", s)).collect();
    items.join(", ")
}

fn is_set_to<V: Bindable>(value: &V) -> String {
    format!("Is set to '{}'.", display(value))
}

fn not_a_string<V: Bindable>(value: &V) -> String {
    format!("The value '{}' is not a string.", display(value))
}
