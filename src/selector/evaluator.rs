// SPDX-License-Identifier: MIT

//! Walk a [`ConditionTree`] against one target

use super::ast::{Combinator, ConditionTree, NodeId, NodeKind, SubSelector};
use super::context::EvaluationContext;
use super::operators::evaluate_leaf;
use crate::binder::Bindable;
use crate::error::Result;

impl ConditionTree {
    /// Evaluate the tree against the context's current value.
    ///
    /// Failing leaves append reasons to the context. An error is only
    /// returned for configuration that turns out to be invalid at evaluation
    /// time, such as a version constraint produced by a function.
    pub fn evaluate<T: Bindable>(&self, ctx: &mut EvaluationContext<'_, T>) -> Result<bool> {
        self.evaluate_node(self.root(), ctx)
    }

    fn evaluate_node<T: Bindable>(&self, id: NodeId, ctx: &mut EvaluationContext<'_, T>) -> Result<bool> {
        let node = self.node(id);
        let result = match &node.kind {
            NodeKind::Leaf(leaf) => evaluate_leaf(leaf, ctx)?,
            NodeKind::Combinator { kind, children, sub: None } => self.combine(*kind, children, ctx)?,
            NodeKind::Combinator {
                kind,
                children,
                sub: Some(sub),
            } => self.sub_select(*kind, children, sub, ctx)?,
        };
        log::debug!("[S] {} = {}", node.path, result);
        Ok(result)
    }

    fn combine<T: Bindable>(
        &self,
        kind: Combinator,
        children: &[NodeId],
        ctx: &mut EvaluationContext<'_, T>,
    ) -> Result<bool> {
        match kind {
            Combinator::AllOf => {
                for child in children {
                    if !self.evaluate_node(*child, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Combinator::AnyOf => {
                for child in children {
                    if self.evaluate_node(*child, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Combinator::Not => match children.first() {
                Some(child) => Ok(!self.evaluate_node(*child, ctx)?),
                None => Ok(false),
            },
            Combinator::If => match children.first() {
                Some(child) => self.evaluate_node(*child, ctx),
                None => Ok(true),
            },
        }
    }

    /// Apply a combinator to each item a field yields. Without a quantifier
    /// every considered item must pass; with one, the number of passing items
    /// is tested.
    fn sub_select<T: Bindable>(
        &self,
        kind: Combinator,
        children: &[NodeId],
        sub: &SubSelector,
        ctx: &mut EvaluationContext<'_, T>,
    ) -> Result<bool> {
        let mut items = sub.field.select(ctx.current(), ctx.query_options());
        if let &[only] = items.as_slice() {
            if !sub.field.is_sequence() && only.is_array() {
                items = only.enumerate_elements().collect();
            }
        }
        let source = sub.field.source();
        let base = source.strip_suffix("[*]").unwrap_or(source);
        let mut passed = 0i64;

        for (i, item) in items.into_iter().enumerate() {
            ctx.push_item(item, format!("{}[{}]", base, i));
            let result = self.sub_item(kind, children, sub, ctx);
            ctx.pop_item();

            match result? {
                None => continue,
                Some(true) => passed += 1,
                Some(false) if sub.quantifier.is_none() => return Ok(false),
                Some(false) => {}
            }
        }
        Ok(sub.quantifier.map_or(true, |q| q.accepts(passed)))
    }

    /// `None` when the item is filtered out by `where`
    fn sub_item<T: Bindable>(
        &self,
        kind: Combinator,
        children: &[NodeId],
        sub: &SubSelector,
        ctx: &mut EvaluationContext<'_, T>,
    ) -> Result<Option<bool>> {
        if let Some(filter) = sub.filter {
            let saved = ctx.reason_count();
            let accepted = self.evaluate_node(filter, ctx)?;
            ctx.truncate_reasons(saved);
            if !accepted {
                return Ok(None);
            }
        }
        self.combine(kind, children, ctx).map(Some)
    }
}
