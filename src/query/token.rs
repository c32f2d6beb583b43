// SPDX-License-Identifier: MIT

//! Token model for query paths

use std::fmt;

/// Comparison operators allowed inside a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// ==
    Eq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// ~= (regular expression)
    RegEx,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::RegEx => "~=",
        }
    }
}

/// Logical operators allowed inside a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A lexical unit of a query path.
///
/// `case_sensitive` on member selectors records a `+` marker in the source,
/// which flips the case sensitivity the path is evaluated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    RootRef,
    CurrentRef,
    DotSelector { name: String, case_sensitive: bool },
    IndexSelector(i64),
    IndexWildSelector,
    DotWildSelector,
    /// `..name`; the name `*` matches every member
    DescendantSelector { name: String, case_sensitive: bool },
    ArraySlice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    UnionIndex(Vec<i64>),
    UnionMember(Vec<String>),
    StartFilter,
    EndFilter,
    StartGroup,
    EndGroup,
    ComparisonOperator(ComparisonOp),
    LogicalOperator(LogicalOp),
    NotOperator,
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl Token {
    /// Shorthand for a case-insensitive member selector
    pub fn dot(name: impl Into<String>) -> Self {
        Token::DotSelector {
            name: name.into(),
            case_sensitive: false,
        }
    }

    /// True for segments that fan out into more than one value
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            Token::IndexWildSelector
                | Token::DotWildSelector
                | Token::DescendantSelector { .. }
                | Token::ArraySlice { .. }
                | Token::UnionIndex(_)
                | Token::UnionMember(_)
                | Token::StartFilter
        )
    }
}

fn marker(case_sensitive: bool) -> &'static str {
    if case_sensitive {
        "+"
    } else {
        "."
    }
}

fn optional(value: &Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::RootRef => write!(f, "$"),
            Token::CurrentRef => write!(f, "@"),
            Token::DotSelector {
                name,
                case_sensitive,
            } => write!(f, "{}{}", marker(*case_sensitive), name),
            Token::IndexSelector(i) => write!(f, "[{}]", i),
            Token::IndexWildSelector => write!(f, "[*]"),
            Token::DotWildSelector => write!(f, ".*"),
            Token::DescendantSelector { name, .. } => write!(f, "..{}", name),
            Token::ArraySlice { start, stop, step } => write!(
                f,
                "[{}:{}:{}]",
                optional(start),
                optional(stop),
                optional(step)
            ),
            Token::UnionIndex(items) => {
                let items: Vec<String> = items.iter().map(i64::to_string).collect();
                write!(f, "[{}]", items.join(","))
            }
            Token::UnionMember(items) => {
                let items: Vec<String> = items.iter().map(|s| format!("'{}'", s)).collect();
                write!(f, "[{}]", items.join(","))
            }
            Token::StartFilter => write!(f, "[?("),
            Token::EndFilter => write!(f, ")]"),
            Token::StartGroup => write!(f, "("),
            Token::EndGroup => write!(f, ")"),
            Token::ComparisonOperator(op) => write!(f, "{}", op.as_str()),
            Token::LogicalOperator(LogicalOp::And) => write!(f, "&&"),
            Token::LogicalOperator(LogicalOp::Or) => write!(f, "||"),
            Token::NotOperator => write!(f, "!"),
            Token::Boolean(b) => write!(f, "{}", b),
            Token::Integer(i) => write!(f, "{}", i),
            Token::String(s) => write!(f, "'{}'", s),
        }
    }
}
