// SPDX-License-Identifier: MIT

//! JSONPath-like query language
//!
//! Paths such as:
//! - `$.store.book[0].author`
//! - `$[*].Spec.Properties.array[?(@.id=='1')].id`
//! - `$..name`, `$.items[::-1]`, `$['name','value']`

mod filter;
mod program;
mod token;
mod tokenizer;

pub use filter::{NodeId, Operand, Predicate, PredicateTree, MAX_FILTER_DEPTH};
pub use program::{QueryOptions, QueryProgram, QueryValue, Segment, DEFAULT_MAX_DEPTH};
pub use token::{ComparisonOp, LogicalOp, Token};
pub use tokenizer::tokenize;

use crate::error::PathError;

/// Compile a path into a reusable program
pub fn compile(path: &str) -> Result<QueryProgram, PathError> {
    QueryProgram::compile(path)
}
