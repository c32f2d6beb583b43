// SPDX-License-Identifier: MIT

//! Filter predicates for `[?...]` segments
//!
//! Predicates are stored as a flat arena of nodes referencing each other by
//! index. `&&` binds tighter than `||`, `!` negates the term that follows it,
//! and a path with no comparison is an existence test.

use super::program::{matching_end_filter, QueryProgram, Walk};
use super::token::{ComparisonOp, LogicalOp, Token};
use crate::binder::Bindable;
use crate::coercion::compile_pattern;
use crate::error::PathError;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Nesting bound for groups and negations within one filter
pub const MAX_FILTER_DEPTH: usize = 64;

pub type NodeId = usize;

/// Right-hand side of a comparison
#[derive(Debug, Clone)]
pub enum Operand {
    Literal(JsonValue),
    Path(QueryProgram),
}

/// A `~=` pattern compiled for both case modes
#[derive(Debug, Clone)]
pub struct Pattern {
    sensitive: Regex,
    insensitive: Regex,
}

impl Pattern {
    fn compile(source: &str, pattern: &str, size_limit: usize) -> Result<Self, PathError> {
        let build = |case_sensitive| {
            compile_pattern(pattern, case_sensitive, size_limit).map_err(|e| {
                PathError::InvalidPattern {
                    expression: source.to_string(),
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                }
            })
        };
        Ok(Self {
            sensitive: build(true)?,
            insensitive: build(false)?,
        })
    }

    fn is_match(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.sensitive.is_match(value)
        } else {
            self.insensitive.is_match(value)
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Comparison {
        op: ComparisonOp,
        left: QueryProgram,
        right: Operand,
        pattern: Option<Pattern>,
    },
    Exists(QueryProgram),
    And(NodeId, NodeId),
    Or(NodeId, NodeId),
    Not(NodeId),
}

/// Compiled predicate of one filter segment
#[derive(Debug, Clone)]
pub struct PredicateTree {
    nodes: Vec<Predicate>,
    root: NodeId,
}

impl PredicateTree {
    /// Compile the tokens between `StartFilter` and `EndFilter`
    pub fn compile(source: &str, tokens: &[Token], regex_size_limit: usize) -> Result<Self, PathError> {
        let mut parser = Parser {
            source,
            tokens,
            regex_size_limit,
            pos: 0,
            nodes: Vec::new(),
        };
        if tokens.is_empty() {
            return Err(parser.invalid("empty filter"));
        }
        let root = parser.parse_or(0)?;
        if parser.pos < tokens.len() {
            return Err(parser.invalid(&format!("unexpected '{}'", tokens[parser.pos])));
        }
        Ok(Self {
            nodes: parser.nodes,
            root,
        })
    }

    pub fn nodes(&self) -> &[Predicate] {
        &self.nodes
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn test<'a, T: Bindable>(&self, candidate: &'a T, walk: &Walk<'a, '_, T>) -> bool {
        self.test_node(self.root, candidate, walk)
    }

    fn test_node<'a, T: Bindable>(&self, id: NodeId, candidate: &'a T, walk: &Walk<'a, '_, T>) -> bool {
        match &self.nodes[id] {
            Predicate::And(a, b) => {
                self.test_node(*a, candidate, walk) && self.test_node(*b, candidate, walk)
            }
            Predicate::Or(a, b) => {
                self.test_node(*a, candidate, walk) || self.test_node(*b, candidate, walk)
            }
            Predicate::Not(a) => !self.test_node(*a, candidate, walk),
            Predicate::Exists(path) => path.resolve(candidate, walk).is_some(),
            Predicate::Comparison {
                op,
                left,
                right,
                pattern,
            } => {
                let Some(left) = first(left, candidate, walk) else {
                    return false;
                };
                match right {
                    Operand::Literal(literal) => compare(*op, left, literal, pattern.as_ref(), walk),
                    Operand::Path(path) => match first(path, candidate, walk) {
                        Some(right) => compare(*op, left, right, None, walk),
                        None => false,
                    },
                }
            }
        }
    }
}

fn first<'a, T: Bindable>(path: &QueryProgram, candidate: &'a T, walk: &Walk<'a, '_, T>) -> Option<&'a T> {
    path.resolve(candidate, walk)
        .and_then(|items| items.into_iter().next())
}

fn compare<T: Bindable, R: Bindable>(
    op: ComparisonOp,
    left: &T,
    right: &R,
    pattern: Option<&Pattern>,
    walk: &Walk<'_, '_, T>,
) -> bool {
    let coercer = &walk.options.coercer;
    let case_sensitive = walk.options.case_sensitive;
    let ordered = |accept: fn(Ordering) -> bool| {
        coercer
            .compare_numeric(left, right, false)
            .is_some_and(accept)
    };
    match op {
        ComparisonOp::Eq => coercer.equal(left, right, case_sensitive, false, false),
        ComparisonOp::Ne => !coercer.equal(left, right, case_sensitive, false, false),
        ComparisonOp::Lt => ordered(Ordering::is_lt),
        ComparisonOp::Le => ordered(Ordering::is_le),
        ComparisonOp::Gt => ordered(Ordering::is_gt),
        ComparisonOp::Ge => ordered(Ordering::is_ge),
        ComparisonOp::RegEx => {
            let Some(value) = left.as_str() else {
                return false;
            };
            match pattern {
                Some(pattern) => pattern.is_match(value, case_sensitive),
                None => right
                    .as_str()
                    .and_then(|p| compile_pattern(p, case_sensitive, walk.options.regex_size_limit).ok())
                    .is_some_and(|re| re.is_match(value)),
            }
        }
    }
}

struct Parser<'t> {
    source: &'t str,
    tokens: &'t [Token],
    regex_size_limit: usize,
    pos: usize,
    nodes: Vec<Predicate>,
}

impl<'t> Parser<'t> {
    fn invalid(&self, message: &str) -> PathError {
        PathError::InvalidFilter {
            expression: self.source.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn push(&mut self, node: Predicate) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn check_depth(&self, depth: usize) -> Result<(), PathError> {
        if depth > MAX_FILTER_DEPTH {
            return Err(self.invalid("filter is nested too deeply"));
        }
        Ok(())
    }

    fn parse_or(&mut self, depth: usize) -> Result<NodeId, PathError> {
        let mut left = self.parse_and(depth)?;
        while self.peek() == Some(&Token::LogicalOperator(LogicalOp::Or)) {
            self.pos += 1;
            let right = self.parse_and(depth)?;
            left = self.push(Predicate::Or(left, right));
        }
        Ok(left)
    }

    fn parse_and(&mut self, depth: usize) -> Result<NodeId, PathError> {
        let mut left = self.parse_unary(depth)?;
        while self.peek() == Some(&Token::LogicalOperator(LogicalOp::And)) {
            self.pos += 1;
            let right = self.parse_unary(depth)?;
            left = self.push(Predicate::And(left, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self, depth: usize) -> Result<NodeId, PathError> {
        self.check_depth(depth)?;
        match self.peek() {
            Some(Token::NotOperator) => {
                self.pos += 1;
                let inner = self.parse_unary(depth + 1)?;
                Ok(self.push(Predicate::Not(inner)))
            }
            Some(Token::StartGroup) => {
                self.pos += 1;
                let inner = self.parse_or(depth + 1)?;
                if self.peek() != Some(&Token::EndGroup) {
                    return Err(self.invalid("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::CurrentRef) | Some(Token::RootRef) => self.parse_relation(),
            Some(other) => Err(self.invalid(&format!("unexpected '{}'", other))),
            None => Err(self.invalid("expected a condition")),
        }
    }

    fn parse_relation(&mut self) -> Result<NodeId, PathError> {
        let left = self.parse_path()?;
        let Some(Token::ComparisonOperator(op)) = self.peek() else {
            return Ok(self.push(Predicate::Exists(left)));
        };
        let op = *op;
        self.pos += 1;
        let right = match self.peek() {
            Some(Token::Boolean(b)) => Operand::Literal(JsonValue::Bool(*b)),
            Some(Token::Integer(i)) => Operand::Literal(JsonValue::from(*i)),
            Some(Token::String(s)) => Operand::Literal(JsonValue::String(s.clone())),
            Some(Token::CurrentRef) | Some(Token::RootRef) => {
                let path = self.parse_path()?;
                return Ok(self.push(Predicate::Comparison {
                    op,
                    left,
                    right: Operand::Path(path),
                    pattern: None,
                }));
            }
            _ => return Err(self.invalid(&format!("expected a value after '{}'", op.as_str()))),
        };
        self.pos += 1;
        let pattern = match (&right, op) {
            (Operand::Literal(JsonValue::String(p)), ComparisonOp::RegEx) => {
                Some(Pattern::compile(self.source, p, self.regex_size_limit)?)
            }
            _ => None,
        };
        Ok(self.push(Predicate::Comparison {
            op,
            left,
            right,
            pattern,
        }))
    }

    /// A reference followed by selector tokens, including nested filters
    fn parse_path(&mut self) -> Result<QueryProgram, PathError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(token) = self.peek() {
            match token {
                Token::DotSelector { .. }
                | Token::IndexSelector(_)
                | Token::IndexWildSelector
                | Token::DotWildSelector
                | Token::DescendantSelector { .. }
                | Token::ArraySlice { .. }
                | Token::UnionIndex(_)
                | Token::UnionMember(_) => self.pos += 1,
                Token::StartFilter => {
                    self.pos = matching_end_filter(self.source, self.tokens, self.pos)? + 1;
                }
                _ => break,
            }
        }
        QueryProgram::from_tokens(self.source, self.tokens[start..self.pos].to_vec(), self.regex_size_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercion::DEFAULT_REGEX_SIZE_LIMIT;
    use crate::query::program::QueryOptions;
    use crate::query::tokenizer::tokenize;

    fn predicate(filter: &str) -> PredicateTree {
        let path = format!("$[?{}]", filter);
        let tokens = tokenize(&path).unwrap();
        let end = tokens.len() - 1;
        PredicateTree::compile(&path, &tokens[2..end], DEFAULT_REGEX_SIZE_LIMIT).unwrap()
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let tree = predicate("@.a || @.b && @.c");
        match &tree.nodes()[tree.root()] {
            Predicate::Or(_, right) => {
                assert!(matches!(tree.nodes()[*right], Predicate::And(_, _)))
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn test_not_group() {
        let tree = predicate("!(@.a == 1 || @.b)");
        assert!(matches!(tree.nodes()[tree.root()], Predicate::Not(_)));
    }

    #[test]
    fn test_exists() {
        let tree = predicate("@.Spec.Properties.Kind");
        assert!(matches!(tree.nodes()[tree.root()], Predicate::Exists(_)));
    }

    #[test]
    fn test_path_operand() {
        let tree = predicate("@.a == @.b");
        assert!(matches!(
            tree.nodes()[tree.root()],
            Predicate::Comparison {
                right: Operand::Path(_),
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_filters() {
        for path in ["$[?(@.a ==)]", "$[?(@.a && )]", "$[?(1 == @.a)]", "$[?(@.a ~= '(')]"] {
            let tokens = tokenize(path).unwrap();
            let end = tokens.len() - 1;
            assert!(
                PredicateTree::compile(path, &tokens[2..end], DEFAULT_REGEX_SIZE_LIMIT).is_err(),
                "{}",
                path
            );
        }
    }

    #[test]
    fn test_evaluate_predicates() {
        let doc = serde_json::json!([
            {"name": "a", "n": 1, "tags": ["x"]},
            {"name": "B", "n": 5},
            {"name": "c", "n": "7"}
        ]);
        let names = |path: &str| -> Vec<String> {
            QueryProgram::compile(path)
                .unwrap()
                .select(&doc, &Default::default())
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        };
        assert_eq!(names("$[?(@.n > 1)].name"), vec!["B"]);
        assert_eq!(names("$[?(@.n != 1)].name"), vec!["B", "c"]);
        assert_eq!(names("$[?(@.name == 'b')].name"), vec!["B"]);
        assert_eq!(names("$[?(@.tags[0] == 'x')].name"), vec!["a"]);
        assert_eq!(names("$[?(!(@.n > 1) && @.name)].name"), vec!["a", "c"]);
        assert_eq!(names("$[?(@.name ~= '^[AB]$')].name"), vec!["a", "B"]);
    }

    #[test]
    fn test_pattern_size_limit() {
        let path = "$[?(@.name ~= '^[a-z]{1000}$')].name";
        assert!(QueryProgram::compile(path).is_ok());

        let options = QueryOptions {
            regex_size_limit: 64,
            ..Default::default()
        };
        let err = QueryProgram::compile_with(path, &options).unwrap_err();
        assert!(matches!(err, PathError::InvalidPattern { .. }), "{:?}", err);
    }
}
