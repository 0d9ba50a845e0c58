// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Filter pushdown across derived-table boundaries
//!
//! A derived table behaves like a table that accepts every predicate on its
//! exposed columns: such predicates are rewritten against the inner plan and
//! re-attached directly below the alias.

use log::debug;

use super::field_indexes::{fix_field_indexes_for_expressions, fix_field_indexes_on_expressions};
use super::filter_set::FilterSet;
use super::predicate_pushdown::{can_do_pushdown, transform_filter_nodes};
use crate::ast::Expression;
use crate::plan::context::QueryContext;
use crate::plan::logical::LogicalNode;
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::scope::Scope;
use crate::plan::transform::transform_expression_up;

pub fn pushdown_subquery_alias_filters(
    ctx: &QueryContext,
    node: LogicalNode,
    scope: &Scope,
) -> OptimizerResult<LogicalNode> {
    if !can_do_pushdown(&node) {
        return Ok(node);
    }

    transform_filter_nodes(ctx, node, scope, &mut |n, filters| match n {
        LogicalNode::SubqueryAlias { .. } => pushdown_filters_under_subquery_alias(n, filters),
        other => fix_field_indexes_for_expressions(other, scope),
    })
}

/// Move the conjuncts attributed to a derived table below its alias. The
/// inner plan of a derived table sees no outer scope.
pub(crate) fn pushdown_filters_under_subquery_alias(
    node: LogicalNode,
    filters: &mut FilterSet,
) -> OptimizerResult<LogicalNode> {
    let (name, input) = match node {
        LogicalNode::SubqueryAlias { name, input } => (name, input),
        other => return Err(OptimizerError::invalid_node("subquery alias pushdown", &other)),
    };

    let handled = filters.available_for_table(&name);
    if handled.is_empty() {
        return Ok(LogicalNode::SubqueryAlias { name, input });
    }
    filters.mark_handled(&handled);

    let child_schema = input.schema();
    let handled =
        fix_field_indexes_on_expressions(&Scope::new(), &child_schema.with_source(&name), handled)?;

    // Positions are shared by the alias schema and the child schema, so each
    // column is renamed to the inner column at the same position.
    let mut rewritten = Vec::with_capacity(handled.len());
    for predicate in handled {
        rewritten.push(transform_expression_up(predicate, &mut |e| match e {
            Expression::Column(c) => match child_schema.get(c.index) {
                Some(inner) => Ok(Expression::Column(c.with_table(&inner.source).with_name(&inner.name))),
                None => Err(OptimizerError::ColumnNotFound {
                    table: c.table.clone(),
                    column: c.name.clone(),
                }),
            },
            other => Ok(other),
        })?);
    }

    debug!(
        "pushed {} filters below subquery alias {:?}",
        rewritten.len(),
        name
    );

    let input = match Expression::join_and(rewritten) {
        Some(condition) => {
            fix_field_indexes_for_expressions(LogicalNode::filter(condition, *input), &Scope::new())?
        }
        None => *input,
    };

    Ok(LogicalNode::SubqueryAlias {
        name,
        input: Box::new(input),
    })
}
