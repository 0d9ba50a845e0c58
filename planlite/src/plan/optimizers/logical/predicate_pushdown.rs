// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Filter pushdown
//!
//! Every filter node is split into conjuncts; conjuncts that reference a
//! single table are installed into that table when it accepts them, or
//! re-attached as a filter directly above it otherwise. The filter node keeps
//! only what could not be relocated.

use log::debug;

use super::field_indexes::{fix_field_indexes_for_expressions, fix_field_indexes_on_expressions};
use super::filter_set::FilterSet;
use super::table_access::{get_table, with_table};
use super::table_aliases::TableAliases;
use crate::ast::Expression;
use crate::plan::context::QueryContext;
use crate::plan::logical::{Decoration, JoinType, LogicalNode};
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::optimizers::physical::index_conversion::convert_filters_to_indexed_access;
use crate::plan::optimizers::physical::index_selection::{index_lookups_by_table, IndexLookupProvider};
use crate::plan::scope::Scope;
use crate::plan::transform::transform_up_with_selector;

/// Whether a tree may be rewritten by any pushdown pass: it must be resolved
/// and must not be a DDL statement or an insert target.
pub fn can_do_pushdown(node: &LogicalNode) -> bool {
    if !node.resolved() {
        return false;
    }
    if node.is_ddl() {
        return false;
    }
    !matches!(node, LogicalNode::InsertInto { .. })
}

/// Child selector for filter relocation.
///
/// Predicates are never moved below the null-producing side of an outer
/// join, below a limit, or across an alias or derived-table boundary.
pub fn filter_pushdown_child_selector(parent: &LogicalNode, _child: &LogicalNode, child_index: usize) -> bool {
    match parent {
        LogicalNode::TableAlias { .. }
        | LogicalNode::SubqueryAlias { .. }
        | LogicalNode::Limit { .. } => false,
        LogicalNode::IndexedJoin { join_type, .. } => match join_type {
            JoinType::Left | JoinType::Right => child_index == 0,
            JoinType::Inner => true,
        },
        LogicalNode::Join { join_type, .. } => match join_type {
            JoinType::Left => child_index == 0,
            JoinType::Right => child_index == 1,
            JoinType::Inner => true,
        },
        _ => true,
    }
}

/// Child selector for the walks that visit every node of one query level.
/// The inner plan of a derived table is optimized on its own, with no outer
/// scope, so these walks stop at the alias.
pub(crate) fn outside_derived_tables(parent: &LogicalNode, _child: &LogicalNode, _child_index: usize) -> bool {
    !matches!(parent, LogicalNode::SubqueryAlias { .. })
}

/// Push filter predicates into the tables that can take them. When an index
/// provider is given, eligible scans are first converted to index accesses.
pub fn pushdown_filters(
    ctx: &QueryContext,
    node: LogicalNode,
    scope: &Scope,
    index_provider: Option<&dyn IndexLookupProvider>,
) -> OptimizerResult<LogicalNode> {
    if !can_do_pushdown(&node) {
        return Ok(node);
    }

    let aliases = TableAliases::from_plan(&node)?;

    let node = match index_provider {
        Some(provider) => {
            let lookups = index_lookups_by_table(&node, provider);
            convert_filters_to_indexed_access(ctx, node, scope, &lookups, &aliases)?
        }
        None => node,
    };

    transform_filter_nodes(ctx, node, scope, &mut |n, filters| match n {
        LogicalNode::ResolvedTable { .. }
        | LogicalNode::TableAlias { .. }
        | LogicalNode::IndexedTableAccess { .. }
        | LogicalNode::ValueDerivedTable { .. } => {
            pushdown_filters_to_table(n, scope, filters, &aliases)
        }
        other => fix_field_indexes_for_expressions(other, scope),
    })
}

/// Drive a per-filter rewrite: for each filter node of this query level,
/// bottom-up, attribute its conjuncts, let `visit` relocate them within the
/// filter's subtree, then strip the relocated conjuncts from the filter.
pub(crate) fn transform_filter_nodes<V>(
    ctx: &QueryContext,
    node: LogicalNode,
    scope: &Scope,
    visit: &mut V,
) -> OptimizerResult<LogicalNode>
where
    V: FnMut(LogicalNode, &mut FilterSet) -> OptimizerResult<LogicalNode>,
{
    transform_up_with_selector(ctx, node, &outside_derived_tables, &mut |n| match n {
        LogicalNode::Filter { condition, input } => {
            let mut filters = match FilterSet::build(&condition) {
                Ok(filters) => filters,
                Err(e) => {
                    debug!("skipping pushdown for filter: {}", e);
                    return Ok(LogicalNode::Filter { condition, input });
                }
            };

            let input = transform_up_with_selector(
                ctx,
                *input,
                &filter_pushdown_child_selector,
                &mut |child| visit(child, &mut filters),
            )?;

            let node = remove_pushed_down_predicates(condition, input, &filters);
            fix_field_indexes_for_expressions(node, scope)
        }
        other => Ok(other),
    })
}

/// Rebuild a filter without its handled conjuncts. A filter left with no
/// conjunct is replaced by its input.
pub(crate) fn remove_pushed_down_predicates(
    condition: Expression,
    input: LogicalNode,
    filters: &FilterSet,
) -> LogicalNode {
    if filters.handled_count() == 0 {
        debug!("no handled filters, leaving filter untouched");
        return LogicalNode::filter(condition, input);
    }

    match Expression::join_and(filters.available_filters()) {
        None => {
            debug!("filter node has no unhandled filters, so it will be removed");
            input
        }
        Some(remaining) => {
            debug!(
                "{} handled filters removed from filter node, filter has now {} filters",
                filters.handled_count(),
                remaining.split_conjunction().len()
            );
            LogicalNode::filter(remaining, input)
        }
    }
}

fn pushdown_filters_to_table(
    node: LogicalNode,
    scope: &Scope,
    filters: &mut FilterSet,
    aliases: &TableAliases,
) -> OptimizerResult<LogicalNode> {
    let name = match node.name() {
        Some(name) => name.to_string(),
        None => return Err(OptimizerError::invalid_node("pushdown", &node)),
    };

    let mut replacement = None;
    let mut decoration = None;

    // Install what the table itself can enforce
    if let Some(table) = get_table(&node) {
        if let Some(filtered) = table.as_filtered() {
            let candidates = filters.available_for_table(&name);
            if !candidates.is_empty() {
                let normalized = aliases.normalize_all(&candidates);
                let accepted = filtered.handled_filters(&normalized);

                let (handled, installed): (Vec<Expression>, Vec<Expression>) = candidates
                    .iter()
                    .zip(normalized)
                    .filter(|(_, n)| accepted.contains(n))
                    .map(|(original, n)| (original.clone(), n))
                    .unzip();

                if !handled.is_empty() {
                    filters.mark_handled(&handled);
                    let installed = fix_field_indexes_on_expressions(scope, &table.schema(), installed)?;
                    debug!(
                        "table {:?} transformed with pushdown of filters, {} filters handled of {}",
                        name,
                        installed.len(),
                        candidates.len()
                    );
                    replacement = Some(filtered.with_filters(installed.clone())?);
                    decoration = Some(Decoration::FilteredAccess { filters: installed });
                }
            }
        }
    }

    // Whatever is left for this table goes directly above it
    let remaining = filters.available_for_table(&name);
    let pushed_above = if remaining.is_empty() {
        None
    } else {
        filters.mark_handled(&remaining);
        let fixed = fix_field_indexes_on_expressions(scope, &node.schema(), remaining)?;
        debug!(
            "pushed down filters above table {:?}, {} filters handled",
            name,
            fixed.len()
        );
        Expression::join_and(fixed)
    };

    let mut result = node;
    if let Some(table) = replacement {
        result = with_table(result, table, scope)?;
    }
    if let Some(decoration) = decoration {
        result = LogicalNode::decorated(decoration, result);
    }
    if let Some(condition) = pushed_above {
        result = LogicalNode::filter(condition, result);
    }
    Ok(result)
}
