// SPDX-License-Identifier: MIT

//! Path queries and declarative selectors over structured data
//!
//! - [`query`] compiles JSONPath-like expressions (`resources[?@.type == 'vm'].name`)
//!   and evaluates them against any [`binder::Bindable`] value.
//! - [`selector`] compiles condition documents (`allOf`, `anyOf`, `not`, leaf
//!   operators) and decides whether a target matches, with reasons when it
//!   does not.
//! - [`functions`] provides the expressions usable in place of literal values.
//! - [`version`] implements semantic and calendar version constraints.

pub mod binder;
pub mod coercion;
pub mod error;
pub mod functions;
pub mod loader;
pub mod options;
pub mod query;
pub mod selector;
pub mod types;
pub mod version;

pub use error::{PathError, Result, SelectorError, VersionError};
pub use options::Options;
pub use query::QueryProgram;
pub use selector::{Outcome, Selector, SelectorBuilder, SelectorRegistry, SelectorResult};
