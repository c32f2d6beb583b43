// SPDX-License-Identifier: MIT

//! Condition tree
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. A tree is
//! immutable once built and can be evaluated from many threads at once.

use super::operators::Operator;
use crate::functions::{ExprFn, FunctionScope};
use crate::query::QueryProgram;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::fmt;

/// Index of a node within its [`ConditionTree`]
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    AllOf,
    AnyOf,
    Not,
    If,
}

impl Combinator {
    pub fn from_key(key: &str) -> Option<Self> {
        [Self::AllOf, Self::AnyOf, Self::Not, Self::If]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(key))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Combinator::AllOf => "allOf",
            Combinator::AnyOf => "anyOf",
            Combinator::Not => "not",
            Combinator::If => "if",
        }
    }

    /// `not` and `if` take exactly one child
    pub fn is_unary(&self) -> bool {
        matches!(self, Combinator::Not | Combinator::If)
    }
}

/// How many items of a sub-selector must pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Count(i64),
    Less(i64),
    LessOrEqual(i64),
    Greater(i64),
    GreaterOrEqual(i64),
}

impl Quantifier {
    pub fn accepts(&self, passed: i64) -> bool {
        match *self {
            Quantifier::Count(n) => passed == n,
            Quantifier::Less(n) => passed < n,
            Quantifier::LessOrEqual(n) => passed <= n,
            Quantifier::Greater(n) => passed > n,
            Quantifier::GreaterOrEqual(n) => passed >= n,
        }
    }
}

/// A combinator applied to every item a field yields
#[derive(Debug, Clone)]
pub struct SubSelector {
    pub field: QueryProgram,
    /// Only items passing this condition are considered
    pub filter: Option<NodeId>,
    pub quantifier: Option<Quantifier>,
}

/// A literal parameter, or a function evaluated per target
#[derive(Debug, Clone)]
pub enum ValueSource {
    Literal(JsonValue),
    Function(ExprFn),
}

impl ValueSource {
    pub fn resolve(&self, scope: &dyn FunctionScope) -> Cow<'_, JsonValue> {
        match self {
            ValueSource::Literal(value) => Cow::Borrowed(value),
            ValueSource::Function(f) => Cow::Owned(f.call(scope)),
        }
    }
}

/// Where a leaf takes the value it tests from
#[derive(Debug, Clone)]
pub enum OperandSource {
    Field(QueryProgram),
    /// The bound name of the target (`name: '.'`)
    Name,
    /// The bound type of the target (`type: '.'`)
    Type,
    Value(ValueSource),
}

/// Boolean switches shared by leaf operators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafFlags {
    pub case_sensitive: bool,
    pub convert: bool,
    pub unique: bool,
    pub ignore_scheme: bool,
    pub include_prerelease: bool,
    pub require_letters: bool,
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub operator: Operator,
    pub operand: Option<OperandSource>,
    pub flags: LeafFlags,
}

impl Leaf {
    /// The source text of a `field` operand
    pub fn field(&self) -> Option<&QueryProgram> {
        match &self.operand {
            Some(OperandSource::Field(program)) => Some(program),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Combinator {
        kind: Combinator,
        children: Vec<NodeId>,
        sub: Option<SubSelector>,
    },
    Leaf(Leaf),
}

#[derive(Debug, Clone)]
pub struct ConditionNode {
    /// Trace path such as `.allOf[0].equals`
    pub path: String,
    pub kind: NodeKind,
}

impl ConditionNode {
    pub fn name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Combinator { kind, .. } => kind.name(),
            NodeKind::Leaf(leaf) => leaf.operator.name(),
        }
    }
}

/// An immutable compiled condition
#[derive(Debug, Clone)]
pub struct ConditionTree {
    nodes: Vec<ConditionNode>,
    root: NodeId,
}

impl ConditionTree {
    pub(crate) fn new(nodes: Vec<ConditionNode>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ConditionNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[ConditionNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nesting depth, counting the root as 1
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            max = max.max(depth);
            if let NodeKind::Combinator { children, sub, .. } = &self.nodes[id].kind {
                stack.extend(children.iter().map(|child| (*child, depth + 1)));
                if let Some(filter) = sub.as_ref().and_then(|s| s.filter) {
                    stack.push((filter, depth + 1));
                }
            }
        }
        max
    }
}

impl fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(f, "{}", node.path)?;
        }
        Ok(())
    }
}
