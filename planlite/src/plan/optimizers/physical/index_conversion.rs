// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Conversion of full scans into index accesses
//!
//! The filters that justified a lookup are left in place; the lookup only
//! narrows the rows the scan produces.

use log::debug;

use super::index_selection::IndexLookupsByTable;
use crate::plan::context::QueryContext;
use crate::plan::logical::{JoinType, LogicalNode};
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::optimizers::logical::field_indexes::{
    fix_field_indexes_for_expressions, fix_field_indexes_for_table_node,
};
use crate::plan::optimizers::logical::table_access::{base_table_node, get_table};
use crate::plan::optimizers::logical::table_aliases::TableAliases;
use crate::plan::scope::Scope;
use crate::plan::transform::transform_up_with_selector;

/// Child selector for index conversion. Only the primary side of an indexed
/// join and the preserved side of an outer join are converted; existing
/// index accesses are left alone.
pub fn index_conversion_child_selector(parent: &LogicalNode, child: &LogicalNode, child_index: usize) -> bool {
    if matches!(child, LogicalNode::IndexedTableAccess { .. }) {
        return false;
    }
    match parent {
        LogicalNode::TableAlias { .. }
        | LogicalNode::SubqueryAlias { .. }
        | LogicalNode::Limit { .. } => false,
        LogicalNode::IndexedJoin { .. } => child_index == 0,
        LogicalNode::Join { join_type, .. } => match join_type {
            JoinType::Left => child_index == 0,
            JoinType::Right => child_index == 1,
            JoinType::Inner => true,
        },
        _ => true,
    }
}

/// Replace the scans named in `lookups` with index accesses
pub fn convert_filters_to_indexed_access(
    ctx: &QueryContext,
    node: LogicalNode,
    scope: &Scope,
    lookups: &IndexLookupsByTable,
    aliases: &TableAliases,
) -> OptimizerResult<LogicalNode> {
    if lookups.is_empty() {
        return Ok(node);
    }

    transform_up_with_selector(ctx, node, &index_conversion_child_selector, &mut |n| match n {
        LogicalNode::TableAlias { .. } | LogicalNode::ResolvedTable { .. } => {
            pushdown_indexes_to_table(n, scope, lookups, aliases)
        }
        other => fix_field_indexes_for_expressions(other, scope),
    })
}

fn pushdown_indexes_to_table(
    node: LogicalNode,
    scope: &Scope,
    lookups: &IndexLookupsByTable,
    aliases: &TableAliases,
) -> OptimizerResult<LogicalNode> {
    let name = match node.name() {
        Some(name) => name.to_lowercase(),
        None => return Err(OptimizerError::invalid_node("index pushdown", &node)),
    };
    let descriptor = match lookups.get(&name) {
        Some(descriptor) => descriptor,
        None => return Ok(node),
    };
    if !matches!(base_table_node(&node), LogicalNode::ResolvedTable { .. }) {
        return Ok(node);
    }
    let table = match get_table(&node) {
        Some(table) => table,
        None => return Ok(node),
    };
    let addressable = match table.as_index_addressable() {
        Some(addressable) => addressable,
        None => return Ok(node),
    };

    let access = LogicalNode::IndexedTableAccess {
        table: addressable.with_index_lookup(&descriptor.lookup)?,
        index: descriptor.index.clone(),
        lookup: descriptor.lookup.clone(),
        key_expressions: aliases.normalize_all(&descriptor.key_expressions),
    };
    let access = fix_field_indexes_for_table_node(access, scope)?;

    debug!("table {:?} transformed with pushdown of index {:?}", name, descriptor.index.id);

    replace_scan(node, access)
}

// Swap the full scan at the bottom of an alias or decoration chain
fn replace_scan(node: LogicalNode, access: LogicalNode) -> OptimizerResult<LogicalNode> {
    match node {
        LogicalNode::ResolvedTable { .. } => Ok(access),
        LogicalNode::TableAlias { name, input } => Ok(LogicalNode::TableAlias {
            name,
            input: Box::new(replace_scan(*input, access)?),
        }),
        LogicalNode::Decorated { decoration, input } => Ok(LogicalNode::Decorated {
            decoration,
            input: Box::new(replace_scan(*input, access)?),
        }),
        other => Err(OptimizerError::invalid_node("index pushdown", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;
    use crate::plan::optimizers::logical::field_indexes::fix_field_indexes_up;
    use crate::plan::optimizers::logical::predicate_pushdown::pushdown_filters;
    use crate::plan::optimizers::physical::index_selection::{index_lookups_by_table, ConjunctIndexSelector};
    use crate::schema::{Column, DataType};
    use crate::storage::{MemoryTable, TableHandle};

    fn table(name: &str) -> LogicalNode {
        let t = MemoryTable::new(
            name,
            vec![
                Column::new("x", "", DataType::Integer, false),
                Column::new("y", "", DataType::Integer, false),
            ],
        )
        .with_index(&format!("{}_x", name), &["x"], true)
        .with_index(&format!("{}_y", name), &["y"], false);
        LogicalNode::table(TableHandle::new(t))
    }

    fn convert(node: LogicalNode) -> LogicalNode {
        let ctx = QueryContext::new();
        let node = fix_field_indexes_up(&ctx, node, &Scope::new()).unwrap();
        let aliases = TableAliases::from_plan(&node).unwrap();
        let lookups = index_lookups_by_table(&node, &ConjunctIndexSelector);
        convert_filters_to_indexed_access(&ctx, node, &Scope::new(), &lookups, &aliases).unwrap()
    }

    #[test]
    fn test_scan_becomes_index_access_and_filter_stays() {
        let plan = LogicalNode::filter(
            Expression::column("a", "x", 0).equals(Expression::literal(5)),
            table("a"),
        );
        assert_eq!(
            convert(plan).to_string(),
            "Filter(a.x = 5)\n  IndexedTableAccess(a on [a.x] lookup [5])"
        );
    }

    #[test]
    fn test_aliased_key_expressions_use_base_table() {
        let plan = LogicalNode::filter(
            Expression::column("t1", "y", 1).equals(Expression::literal(4)),
            LogicalNode::alias("t1", table("a")),
        );
        let converted = convert(plan);
        assert_eq!(
            converted.to_string(),
            "Filter(t1.y = 4)\n  TableAlias(t1)\n    IndexedTableAccess(a on [a.y] lookup [4])"
        );

        let access = base_table_node(converted.children()[0]);
        match access {
            LogicalNode::IndexedTableAccess { key_expressions, .. } => {
                let refs = key_expressions[0].column_refs();
                assert_eq!(refs[0].table, "a");
                assert_eq!(refs[0].index, 1);
            }
            other => panic!("unexpected node {}", other),
        }
    }

    #[test]
    fn test_conversion_is_not_repeated() {
        let plan = LogicalNode::filter(
            Expression::column("a", "x", 0).equals(Expression::literal(5)),
            table("a"),
        );
        let once = convert(plan);
        let twice = convert(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_pushdown_installs_filters_into_index_access() {
        let ctx = QueryContext::new();
        let plan = fix_field_indexes_up(
            &ctx,
            LogicalNode::filter(
                Expression::column("a", "x", 0).equals(Expression::literal(5)),
                table("a"),
            ),
            &Scope::new(),
        )
        .unwrap();
        let pushed = pushdown_filters(&ctx, plan, &Scope::new(), Some(&ConjunctIndexSelector)).unwrap();
        assert_eq!(
            pushed.to_string(),
            "Filtered table access on [(a.x = 5)]\n  IndexedTableAccess(a on [a.x] lookup [5])"
        );
    }

    #[test]
    fn test_indexed_join_converts_primary_side_only() {
        let condition = || {
            Expression::column("a", "x", 0)
                .equals(Expression::literal(1))
                .and(Expression::column("b", "x", 0).equals(Expression::literal(2)))
        };
        let join_condition = || Expression::column("a", "y", 0).equals(Expression::column("b", "y", 0));

        let indexed = convert(LogicalNode::filter(
            condition(),
            LogicalNode::IndexedJoin {
                join_type: JoinType::Inner,
                condition: join_condition(),
                left: Box::new(table("a")),
                right: Box::new(table("b")),
            },
        ));
        let explain = indexed.to_string();
        assert!(explain.contains("IndexedTableAccess(a on [a.x] lookup [1])"), "{}", explain);
        assert!(explain.contains("    Table(b)"), "{}", explain);

        // A plain inner join converts both sides
        let plain = convert(LogicalNode::filter(
            condition(),
            LogicalNode::join(JoinType::Inner, join_condition(), table("a"), table("b")),
        ));
        let explain = plain.to_string();
        assert!(explain.contains("IndexedTableAccess(a on [a.x] lookup [1])"), "{}", explain);
        assert!(explain.contains("IndexedTableAccess(b on [b.x] lookup [2])"), "{}", explain);
    }
}
