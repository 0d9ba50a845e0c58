// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Projection pushdown
//!
//! Computes the columns referenced anywhere in the query and narrows every
//! table that accepts a projection to those columns.

use log::debug;
use std::collections::BTreeMap;

use super::field_indexes::fix_field_indexes_for_expressions;
use super::predicate_pushdown::can_do_pushdown;
use super::table_access::{base_table_node, get_table, with_table};
use crate::ast::Expression;
use crate::plan::context::QueryContext;
use crate::plan::logical::{Decoration, LogicalNode};
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::scope::Scope;
use crate::plan::transform::{inspect, transform_up_with_selector};
use crate::storage::TableHandle;

/// Referenced column names per lowercased table or alias name
pub type FieldsByTable = BTreeMap<String, Vec<String>>;

pub fn pushdown_projections(ctx: &QueryContext, node: LogicalNode, scope: &Scope) -> OptimizerResult<LogicalNode> {
    if !can_do_pushdown(&node) || !can_project(&node) {
        return Ok(node);
    }

    let fields = fields_by_table(&node);
    let mut used: BTreeMap<String, (Vec<String>, TableHandle)> = BTreeMap::new();

    transform_up_with_selector(ctx, node, &projection_child_selector, &mut |n| match n {
        LogicalNode::TableAlias { .. }
        | LogicalNode::ResolvedTable { .. }
        | LogicalNode::IndexedTableAccess { .. } => {
            let n = pushdown_projections_to_table(n, &fields, &mut used, scope)?;
            fix_field_indexes_for_expressions(n, scope)
        }
        other => fix_field_indexes_for_expressions(other, scope),
    })
}

/// Whether projection pushdown may run on this tree at all.
///
/// Skipped for row-changing statements, for trees holding a subquery
/// expression, an unqualified column or an indexed join, and for trees that
/// already carry a projected table access.
pub fn can_project(node: &LogicalNode) -> bool {
    if matches!(node, LogicalNode::Update { .. } | LogicalNode::DeleteFrom { .. }) {
        return false;
    }

    let mut contains_subquery = false;
    let mut contains_unqualified = false;
    let mut contains_indexed_join = false;
    let mut already_pushed_down = false;

    inspect(node, &mut |n| {
        for expr in n.expressions() {
            expr.inspect(&mut |e| {
                match e {
                    Expression::Subquery(_) => contains_subquery = true,
                    Expression::Column(c) if c.table.is_empty() => contains_unqualified = true,
                    _ => {}
                }
                !contains_subquery
            });
        }
        match n {
            LogicalNode::IndexedJoin { .. } => contains_indexed_join = true,
            LogicalNode::Decorated {
                decoration: Decoration::ProjectedAccess { .. },
                ..
            } => already_pushed_down = true,
            _ => {}
        }
        !matches!(n, LogicalNode::SubqueryAlias { .. })
    });

    if contains_subquery {
        // TODO: narrow this guard to tables the subquery actually shares with the outer query
        debug!("skipping pushdown of projection for query with subquery");
        return false;
    }
    // Unqualified columns cannot be attributed to the table that must keep them
    if contains_unqualified {
        debug!("skipping pushdown of projection for query with unqualified column");
        return false;
    }
    if contains_indexed_join {
        debug!("skipping pushdown of projection for query with an indexed join");
        return false;
    }
    if already_pushed_down {
        debug!("skipping pushdown of projection for query with projected table access");
        return false;
    }
    true
}

fn projection_child_selector(parent: &LogicalNode, _child: &LogicalNode, _child_index: usize) -> bool {
    // Below an alias column names are the unaliased ones; derived tables are
    // optimized on their own.
    !matches!(
        parent,
        LogicalNode::TableAlias { .. } | LogicalNode::SubqueryAlias { .. }
    )
}

fn add_field(fields: &mut FieldsByTable, table: &str, column: &str) {
    if table.is_empty() {
        return;
    }
    let columns = fields.entry(table.to_lowercase()).or_default();
    if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
        columns.push(column.to_string());
    }
}

/// Every column referenced by an expression of the tree, by the table or
/// alias qualifying it. The query output and predicates already installed
/// into tables count as references.
pub fn fields_by_table(node: &LogicalNode) -> FieldsByTable {
    let mut fields = FieldsByTable::new();

    for column in node.schema().iter() {
        add_field(&mut fields, &column.source, &column.name);
    }

    inspect(node, &mut |n| {
        let mut exprs: Vec<&Expression> = n.expressions();
        if let LogicalNode::Decorated {
            decoration: Decoration::FilteredAccess { filters },
            ..
        } = n
        {
            exprs.extend(filters.iter());
        }
        for expr in exprs {
            for c in expr.column_refs() {
                add_field(&mut fields, &c.table, &c.name);
            }
        }
        !matches!(n, LogicalNode::SubqueryAlias { .. })
    });

    fields
}

fn pushdown_projections_to_table(
    node: LogicalNode,
    fields: &FieldsByTable,
    used: &mut BTreeMap<String, (Vec<String>, TableHandle)>,
    scope: &Scope,
) -> OptimizerResult<LogicalNode> {
    let name = match node.name() {
        Some(name) => name.to_lowercase(),
        None => return Err(OptimizerError::invalid_node("pushdown", &node)),
    };

    let table = match get_table(&node) {
        Some(table) => table,
        None => return Ok(node),
    };
    let projected = match table.as_projected() {
        Some(projected) if projected.projection().is_none() => projected,
        _ => return Ok(node),
    };

    // An alias also needs the columns referenced through the base table name,
    // such as index key expressions.
    let mut requested: Vec<&String> = fields.get(&name).map(|f| f.iter().collect()).unwrap_or_default();
    if matches!(node, LogicalNode::TableAlias { .. }) {
        if let Some(base) = base_table_node(&node).name() {
            if let Some(base_fields) = fields.get(&base.to_lowercase()) {
                requested.extend(base_fields.iter());
            }
        }
    }
    if requested.is_empty() {
        return Ok(node);
    }

    let columns: Vec<String> = table
        .schema()
        .iter()
        .filter(|c| requested.iter().any(|r| r.eq_ignore_ascii_case(&c.name)))
        .map(|c| c.name.clone())
        .collect();
    if columns.is_empty() {
        return Ok(node);
    }

    let (columns, projected_table) = match used.get(&name) {
        Some(applied) => applied.clone(),
        None => {
            let projected_table = projected.with_projection(&columns)?;
            used.insert(name.clone(), (columns.clone(), projected_table.clone()));
            (columns, projected_table)
        }
    };

    debug!("table {:?} transformed with pushdown of projection {:?}", name, columns);

    let node = with_table(node, projected_table, scope)?;
    Ok(LogicalNode::decorated(
        Decoration::ProjectedAccess { columns },
        node,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SubqueryExpression;
    use crate::plan::logical::JoinType;
    use crate::plan::optimizers::logical::field_indexes::fix_field_indexes_up;
    use crate::schema::{Column, DataType};
    use crate::storage::MemoryTable;

    fn table(name: &str, prefix: char) -> LogicalNode {
        let columns = ['x', 'y', 'z']
            .iter()
            .map(|c| Column::new(format!("{}{}", c, prefix), "", DataType::Integer, false))
            .collect();
        LogicalNode::table(TableHandle::new(MemoryTable::new(name, columns)))
    }

    fn query() -> LogicalNode {
        LogicalNode::project(
            vec![Expression::column("a", "za", 0)],
            LogicalNode::join(
                JoinType::Inner,
                Expression::column("a", "xa", 0).equals(Expression::column("t", "yb", 0)),
                table("a", 'a'),
                LogicalNode::alias("t", table("b", 'b')),
            ),
        )
    }

    fn project(node: LogicalNode) -> LogicalNode {
        let ctx = QueryContext::new();
        let bound = fix_field_indexes_up(&ctx, node, &Scope::new()).unwrap();
        pushdown_projections(&ctx, bound, &Scope::new()).unwrap()
    }

    #[test]
    fn test_tables_are_narrowed_to_referenced_columns() {
        let projected = project(query());
        assert_eq!(
            projected.to_string(),
            "Project(a.za)\n  InnerJoin(a.xa = t.yb)\n    Projected table access on [xa za]\n      Table(a)\n    Projected table access on [yb]\n      TableAlias(t)\n        Table(b)"
        );

        // Positions follow the narrowed schemas
        let join = projected.children()[0];
        let refs: Vec<usize> = join.expressions()[0].column_refs().iter().map(|c| c.index).collect();
        assert_eq!(refs, vec![0, 2]);
        let output: Vec<usize> = projected.expressions()[0].column_refs().iter().map(|c| c.index).collect();
        assert_eq!(output, vec![1]);
    }

    #[test]
    fn test_second_application_is_a_no_op() {
        let once = project(query());
        let twice = pushdown_projections(&QueryContext::new(), once.clone(), &Scope::new()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_subquery_disables_projection() {
        let plan = LogicalNode::filter(
            Expression::column("a", "xa", 0).equals(Expression::Subquery(SubqueryExpression {
                plan: Box::new(table("b", 'b')),
            })),
            table("a", 'a'),
        );
        assert!(!can_project(&plan));
        assert!(can_project(&table("a", 'a')));
    }

    #[test]
    fn test_unqualified_column_disables_projection() {
        let plan = LogicalNode::project(
            vec![Expression::column("a", "za", 2)],
            LogicalNode::filter(
                Expression::column("", "xa", 0).equals(Expression::literal(1)),
                table("a", 'a'),
            ),
        );
        assert!(!can_project(&plan));
    }

    #[test]
    fn test_indexed_join_disables_projection() {
        let plan = LogicalNode::project(
            vec![Expression::column("a", "za", 2)],
            LogicalNode::IndexedJoin {
                join_type: JoinType::Inner,
                condition: Expression::column("a", "xa", 0).equals(Expression::column("b", "xb", 3)),
                left: Box::new(table("a", 'a')),
                right: Box::new(table("b", 'b')),
            },
        );
        assert!(!can_project(&plan));

        let bound = fix_field_indexes_up(&QueryContext::new(), plan, &Scope::new()).unwrap();
        let pushed = pushdown_projections(&QueryContext::new(), bound.clone(), &Scope::new()).unwrap();
        assert_eq!(pushed, bound);
    }

    #[test]
    fn test_fields_include_query_output() {
        let plan = LogicalNode::filter(
            Expression::column("a", "ya", 1).equals(Expression::literal(1)),
            table("a", 'a'),
        );
        let fields = fields_by_table(&plan);
        assert_eq!(fields["a"], vec!["xa", "ya", "za"]);
    }
}
