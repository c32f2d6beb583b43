// SPDX-License-Identifier: MIT

//! Shared type coercion rules
//!
//! Both the query filter evaluator and every selector leaf operator convert
//! and compare values through [`Coercer`]. Conversions from strings only
//! happen when a caller explicitly asks for them with `convert`; a failed
//! conversion is reported as `None`, never as an error.

use crate::binder::{Bindable, ValueKind};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Default upper bound for a compiled regular expression
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Formatting and parsing conventions.
///
/// Passed explicitly instead of reading any process-wide culture setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Invariant,
}

impl Locale {
    pub fn format_bool(&self, value: bool) -> String {
        match self {
            Locale::Invariant => if value { "True" } else { "False" }.to_string(),
        }
    }

    pub fn format_integer(&self, value: i64) -> String {
        match self {
            Locale::Invariant => value.to_string(),
        }
    }

    pub fn format_float(&self, value: f64) -> String {
        match self {
            Locale::Invariant => value.to_string(),
        }
    }

    pub fn parse_bool(&self, s: &str) -> Option<bool> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("true") {
            Some(true)
        } else if s.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    pub fn parse_integer(&self, s: &str) -> Option<i64> {
        s.trim().parse::<i64>().ok()
    }

    pub fn parse_float(&self, s: &str) -> Option<f64> {
        s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
    }

    pub fn parse_datetime(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Some(dt.and_utc());
            }
        }
        for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
        None
    }
}

/// Conversion and comparison surface with an explicit locale and clock
#[derive(Debug, Clone, Copy)]
pub struct Coercer {
    locale: Locale,
    now: DateTime<Utc>,
}

impl Default for Coercer {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl Coercer {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            now: Utc::now(),
        }
    }

    /// Pin the clock used for day offsets
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn try_string<'a, T: Bindable>(&self, value: &'a T) -> Option<&'a str> {
        value.as_str()
    }

    /// String view of a value, formatting scalars when `convert` is set
    pub fn try_string_convert<'a, T: Bindable>(
        &self,
        value: &'a T,
        convert: bool,
    ) -> Option<Cow<'a, str>> {
        if let Some(s) = value.as_str() {
            return Some(Cow::Borrowed(s));
        }
        if !convert {
            return None;
        }
        match value.kind() {
            ValueKind::Integer => value
                .as_i64()
                .map(|i| Cow::Owned(self.locale.format_integer(i))),
            ValueKind::Bool => value
                .as_bool()
                .map(|b| Cow::Owned(self.locale.format_bool(b))),
            ValueKind::Float => value
                .as_f64()
                .map(|f| Cow::Owned(self.locale.format_float(f))),
            _ => None,
        }
    }

    pub fn try_bool<T: Bindable>(&self, value: &T, convert: bool) -> Option<bool> {
        if let Some(b) = value.as_bool() {
            return Some(b);
        }
        if convert {
            return value.as_str().and_then(|s| self.locale.parse_bool(s));
        }
        None
    }

    pub fn try_long<T: Bindable>(&self, value: &T, convert: bool) -> Option<i64> {
        if value.kind() == ValueKind::Integer {
            return value.as_i64();
        }
        if convert {
            return value.as_str().and_then(|s| self.locale.parse_integer(s));
        }
        None
    }

    pub fn try_int<T: Bindable>(&self, value: &T, convert: bool) -> Option<i32> {
        self.try_long(value, convert)
            .and_then(|l| i32::try_from(l).ok())
    }

    pub fn try_float<T: Bindable>(&self, value: &T, convert: bool) -> Option<f64> {
        match value.kind() {
            ValueKind::Float => value.as_f64(),
            ValueKind::Integer if convert => value.as_f64(),
            ValueKind::String if convert => value.as_str().and_then(|s| self.locale.parse_float(s)),
            _ => None,
        }
    }

    /// Date view of a value. With `convert`, strings are parsed and an
    /// integer is read as a day offset from now.
    pub fn try_datetime<T: Bindable>(&self, value: &T, convert: bool) -> Option<DateTime<Utc>> {
        if !convert {
            return None;
        }
        match value.kind() {
            ValueKind::String => value.as_str().and_then(|s| self.locale.parse_datetime(s)),
            ValueKind::Integer => value
                .as_i64()
                .and_then(Duration::try_days)
                .and_then(|offset| self.now.checked_add_signed(offset)),
            _ => None,
        }
    }

    /// A string becomes a single element list; arrays keep their string
    /// elements.
    pub fn try_string_or_array<T: Bindable>(&self, value: &T, convert: bool) -> Option<Vec<String>> {
        if let Some(s) = self.try_string_convert(value, convert) {
            return Some(vec![s.into_owned()]);
        }
        if !value.is_array() {
            return None;
        }
        Some(
            value
                .enumerate_elements()
                .filter_map(|item| self.try_string_convert(item, convert))
                .map(Cow::into_owned)
                .collect(),
        )
    }

    /// Type-aware equality: string, then boolean, then integer, then any
    /// numeric, then null.
    pub fn equal<E: Bindable, A: Bindable>(
        &self,
        expected: &E,
        actual: &A,
        case_sensitive: bool,
        convert_expected: bool,
        convert_actual: bool,
    ) -> bool {
        if let (Some(e), Some(a)) = (expected.as_str(), actual.as_str()) {
            return string_equal(e, a, case_sensitive);
        }
        if let (Some(e), Some(a)) = (
            self.try_bool(expected, convert_expected),
            self.try_bool(actual, convert_actual),
        ) {
            return e == a;
        }
        if let (Some(e), Some(a)) = (
            self.try_long(expected, convert_expected),
            self.try_long(actual, convert_actual),
        ) {
            return e == a;
        }
        if is_number(expected) && is_number(actual) {
            return expected.as_f64() == actual.as_f64();
        }
        expected.is_null() && actual.is_null()
    }

    /// Order `actual` against `expected`.
    ///
    /// Integers are tried first, then floats, then dates, then the length of
    /// a string or array against an integer. `None` means the two values are
    /// not comparable.
    pub fn compare_numeric<A: Bindable, E: Bindable>(
        &self,
        actual: &A,
        expected: &E,
        convert: bool,
    ) -> Option<Ordering> {
        if let (Some(a), Some(e)) = (self.try_long(actual, convert), self.try_long(expected, true)) {
            return Some(a.cmp(&e));
        }
        if let (Some(a), Some(e)) = (self.try_float(actual, convert), self.try_float(expected, true)) {
            return a.partial_cmp(&e);
        }
        if let (Some(a), Some(e)) = (
            self.try_datetime(actual, convert),
            self.try_datetime(expected, true),
        ) {
            return Some(a.cmp(&e));
        }
        let length = actual
            .as_str()
            .map(|s| s.chars().count())
            .or_else(|| actual.array_len())?;
        let e = self.try_long(expected, true)?;
        Some((length as i64).cmp(&e))
    }

    /// True when `expected` equals `actual`, or any element of `actual` when
    /// it is an array.
    pub fn any_value<A: Bindable, E: Bindable>(&self, actual: &A, expected: &E, case_sensitive: bool) -> bool {
        if actual.is_array()
            && actual
                .enumerate_elements()
                .any(|item| self.equal(expected, item, case_sensitive, false, false))
        {
            return true;
        }
        self.equal(expected, actual, case_sensitive, false, false)
    }

    /// Number of occurrences of `expected` within `actual`
    pub fn count_value<A: Bindable, E: Bindable>(&self, actual: &A, expected: &E, case_sensitive: bool) -> usize {
        if actual.is_array() {
            return actual
                .enumerate_elements()
                .filter(|item| self.equal(expected, *item, case_sensitive, false, false))
                .count();
        }
        usize::from(self.equal(expected, actual, case_sensitive, false, false))
    }
}

fn is_number<T: Bindable>(value: &T) -> bool {
    matches!(value.kind(), ValueKind::Integer | ValueKind::Float)
}

pub fn string_equal(expected: &str, actual: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        expected == actual
    } else {
        expected == actual || expected.to_lowercase() == actual.to_lowercase()
    }
}

/// Null, an empty string, an empty array or an empty object
pub fn null_or_empty<T: Bindable>(value: Option<&T>) -> bool {
    let Some(value) = value else {
        return true;
    };
    match value.kind() {
        ValueKind::Null => true,
        ValueKind::String => value.as_str().is_some_and(str::is_empty),
        ValueKind::Array => value.enumerate_elements().next().is_none(),
        ValueKind::Object => value.enumerate_members().next().is_none(),
        _ => false,
    }
}

/// Element count of an array
pub fn enumerable_len<T: Bindable>(value: &T) -> Option<usize> {
    value.array_len()
}

fn fold(s: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.to_lowercase())
    }
}

pub fn starts_with(value: &str, prefix: &str, case_sensitive: bool) -> bool {
    fold(value, case_sensitive).starts_with(fold(prefix, case_sensitive).as_ref())
}

pub fn ends_with(value: &str, suffix: &str, case_sensitive: bool) -> bool {
    fold(value, case_sensitive).ends_with(fold(suffix, case_sensitive).as_ref())
}

pub fn contains(value: &str, part: &str, case_sensitive: bool) -> bool {
    fold(value, case_sensitive).contains(fold(part, case_sensitive).as_ref())
}

/// All letters are lowercase. With `require_letters`, any non-letter fails.
pub fn is_lower(value: &str, require_letters: bool) -> bool {
    value.chars().all(|c| {
        if c.is_alphabetic() {
            !c.is_uppercase()
        } else {
            !require_letters
        }
    })
}

/// All letters are uppercase. With `require_letters`, any non-letter fails.
pub fn is_upper(value: &str, require_letters: bool) -> bool {
    value.chars().all(|c| {
        if c.is_alphabetic() {
            !c.is_lowercase()
        } else {
            !require_letters
        }
    })
}

/// Wildcard match where `*` is any run of characters and `?` is exactly one
pub fn like(value: &str, pattern: &str, case_sensitive: bool) -> bool {
    let value: Vec<char> = fold(value, case_sensitive).chars().collect();
    let pattern: Vec<char> = fold(pattern, case_sensitive).chars().collect();

    let (mut v, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == value[v]) {
            v += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, v));
            p += 1;
        } else if let Some((star_p, star_v)) = star {
            p = star_p + 1;
            v = star_v + 1;
            star = Some((star_p, star_v + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

fn strip_schema(uri: &str, ignore_scheme: bool) -> &str {
    let uri = uri.trim_end_matches('#');
    if !ignore_scheme {
        return uri;
    }
    uri.strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .unwrap_or(uri)
}

/// Match a `$schema` URI against any of the expected URIs
pub fn any_schema(actual: &str, expected: &[String], ignore_scheme: bool, case_sensitive: bool) -> bool {
    let actual = strip_schema(actual, ignore_scheme);
    expected
        .iter()
        .any(|e| string_equal(strip_schema(e, ignore_scheme), actual, case_sensitive))
}

/// Compile a pattern under a size bound
pub fn compile_pattern(pattern: &str, case_sensitive: bool, size_limit: usize) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .size_limit(size_limit)
        .build()
}
