// SPDX-License-Identifier: MIT

//! Selector engine
//!
//! A [`Selector`] is a named [`ConditionTree`] compiled by
//! [`SelectorBuilder`]. Evaluating it against a target yields an [`Outcome`]
//! and, for non-matches, the [`Reason`]s the failing leaves recorded.
//!
//! ```
//! use selector_rs::options::Options;
//! use selector_rs::selector::{Outcome, Selector, SelectorBuilder};
//! use serde_json::json;
//!
//! let options = Options::default();
//! let tree = SelectorBuilder::new(&options)
//!     .build(&json!({ "field": "Name", "equals": "TargetObject1" }))
//!     .unwrap();
//! let selector = Selector::new("BasicSelector", tree);
//!
//! let result = selector.evaluate(&json!({ "Name": "TargetObject1" }), &options);
//! assert_eq!(result.outcome, Outcome::Match);
//! ```

pub mod ast;
pub mod builder;
pub mod context;
mod evaluator;
pub mod operators;
pub mod reason;
pub mod registry;

pub use ast::{ConditionNode, ConditionTree, NodeKind};
pub use builder::SelectorBuilder;
pub use context::EvaluationContext;
pub use reason::{OperandKind, Reason};
pub use registry::SelectorRegistry;

use crate::binder::Bindable;
use crate::error::Result;
use crate::options::Options;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Result of evaluating a selector against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Match,
    NoMatch,
    /// Invalid configuration discovered while evaluating
    ConfigError(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Match => f.write_str("Match"),
            Outcome::NoMatch => f.write_str("NoMatch"),
            Outcome::ConfigError(message) => write!(f, "ConfigError: {}", message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectorResult {
    pub outcome: Outcome,
    /// Empty when the outcome is a match
    pub reasons: Vec<Reason>,
}

impl SelectorResult {
    pub fn is_match(&self) -> bool {
        self.outcome == Outcome::Match
    }
}

#[derive(Debug, Clone)]
pub struct Selector {
    name: String,
    tree: ConditionTree,
}

impl Selector {
    pub fn new(name: impl Into<String>, tree: ConditionTree) -> Self {
        Self {
            name: name.into(),
            tree,
        }
    }

    /// Compile `condition` and name the result
    pub fn build(name: impl Into<String>, condition: &JsonValue, builder: &SelectorBuilder) -> Result<Self> {
        Ok(Self::new(name, builder.build(condition)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &ConditionTree {
        &self.tree
    }

    pub fn evaluate<T: Bindable>(&self, target: &T, options: &Options) -> SelectorResult {
        let mut ctx = EvaluationContext::new(target, options);
        self.evaluate_in(&mut ctx)
    }

    /// Evaluate a target taken from `parent` within a larger document. Each
    /// reason's `full_path` is rooted at `parent`.
    pub fn evaluate_at<T: Bindable>(&self, target: &T, options: &Options, parent: &str) -> SelectorResult {
        let mut ctx = EvaluationContext::new(target, options).with_parent_path(parent);
        self.evaluate_in(&mut ctx)
    }

    /// Evaluate with a prepared context. Reasons already held by the context
    /// are returned with this result.
    pub fn evaluate_in<T: Bindable>(&self, ctx: &mut EvaluationContext<'_, T>) -> SelectorResult {
        let outcome = match self.tree.evaluate(ctx) {
            Ok(true) => Outcome::Match,
            Ok(false) => Outcome::NoMatch,
            Err(e) => {
                log::warn!("selector '{}' could not be evaluated: {}", self.name, e);
                Outcome::ConfigError(e.to_string())
            }
        };
        let mut reasons = ctx.take_reasons();
        if outcome == Outcome::Match {
            reasons.clear();
        }
        log::debug!("selector '{}' = {}", self.name, outcome);
        SelectorResult { outcome, reasons }
    }

    pub fn matches<T: Bindable>(&self, target: &T, options: &Options) -> bool {
        self.evaluate(target, options).is_match()
    }
}
