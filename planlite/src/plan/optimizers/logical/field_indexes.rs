// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Recomputation of cached column positions
//!
//! A column position counts across the outer scope schema followed by the
//! schema the expression is evaluated against. Resolution prefers the inner
//! schema; the scope is only consulted for columns the inner schema lacks.

use crate::ast::{ColumnRef, Expression};
use crate::plan::context::QueryContext;
use crate::plan::logical::LogicalNode;
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::scope::Scope;
use crate::plan::transform::{transform_expression_up, transform_up};
use crate::schema::Schema;

fn position_in(schema: &Schema, column: &ColumnRef) -> OptimizerResult<Option<usize>> {
    let mut found: Option<usize> = None;
    for (i, candidate) in schema.iter().enumerate() {
        if !candidate.matches(&column.table, &column.name) {
            continue;
        }
        match found {
            None => found = Some(i),
            Some(first) => {
                let first_source = schema.get(first).map(|c| c.source.as_str()).unwrap_or_default();
                if column.table.is_empty() && !first_source.eq_ignore_ascii_case(&candidate.source) {
                    return Err(OptimizerError::AmbiguousColumn(column.name.clone()));
                }
            }
        }
    }
    Ok(found)
}

/// Fix every column position in `expr` against `scope` followed by `schema`
pub fn fix_field_indexes(scope: &Scope, schema: &Schema, expr: Expression) -> OptimizerResult<Expression> {
    let scope_schema = scope.schema();
    let scope_len = scope_schema.len();

    transform_expression_up(expr, &mut |e| match e {
        Expression::Column(c) => {
            if let Some(i) = position_in(schema, &c)? {
                return Ok(Expression::Column(c.with_index(scope_len + i)));
            }
            if let Some(i) = position_in(&scope_schema, &c)? {
                return Ok(Expression::Column(c.with_index(i)));
            }
            Err(OptimizerError::ColumnNotFound {
                table: c.table.clone(),
                column: c.name.clone(),
            })
        }
        other => Ok(other),
    })
}

pub fn fix_field_indexes_on_expressions(
    scope: &Scope,
    schema: &Schema,
    exprs: Vec<Expression>,
) -> OptimizerResult<Vec<Expression>> {
    exprs
        .into_iter()
        .map(|e| fix_field_indexes(scope, schema, e))
        .collect()
}

/// Fix the direct expressions of `node` against its children's schema.
/// Leaves are returned unchanged.
pub fn fix_field_indexes_for_expressions(node: LogicalNode, scope: &Scope) -> OptimizerResult<LogicalNode> {
    if node.children().is_empty() || node.expressions().is_empty() {
        return Ok(node);
    }
    let schema = node.children_schema();
    node.map_expressions(|e| fix_field_indexes(scope, &schema, e))
}

/// Fix the expressions a leaf holds about itself, against its own schema
pub fn fix_field_indexes_for_table_node(node: LogicalNode, scope: &Scope) -> OptimizerResult<LogicalNode> {
    let schema = node.schema();
    node.map_expressions(|e| fix_field_indexes(scope, &schema, e))
}

/// Fix every node of a tree, children first
pub fn fix_field_indexes_up(ctx: &QueryContext, node: LogicalNode, scope: &Scope) -> OptimizerResult<LogicalNode> {
    transform_up(ctx, node, &mut |n| match n {
        LogicalNode::IndexedTableAccess { .. } => fix_field_indexes_for_table_node(n, scope),
        other => fix_field_indexes_for_expressions(other, scope),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::logical::JoinType;
    use crate::schema::{Column, DataType};
    use crate::storage::{MemoryTable, TableHandle};

    fn table(name: &str, columns: &[&str]) -> LogicalNode {
        LogicalNode::table(TableHandle::new(MemoryTable::new(
            name,
            columns
                .iter()
                .map(|c| Column::new(*c, "", DataType::Integer, false))
                .collect(),
        )))
    }

    fn index_of(expr: &Expression) -> usize {
        match expr {
            Expression::Column(c) => c.index,
            _ => panic!("not a column"),
        }
    }

    #[test]
    fn test_join_condition_positions_follow_concatenated_schema() {
        let join = LogicalNode::join(
            JoinType::Inner,
            Expression::column("a", "xa", 99).equals(Expression::column("b", "xb", 99)),
            table("a", &["xa", "ya"]),
            table("b", &["xb"]),
        );
        let fixed = fix_field_indexes_for_expressions(join, &Scope::new()).unwrap();
        let condition = fixed.expressions()[0].clone();
        let refs = condition.column_refs();
        assert_eq!(refs[0].index, 0);
        assert_eq!(refs[1].index, 2);
    }

    #[test]
    fn test_scope_columns_come_first() {
        let outer = LogicalNode::filter(Expression::literal(true), table("o", &["ox", "oy"]));
        let scope = Scope::new().new_scope(outer);
        let schema = table("a", &["xa"]).schema();

        let inner = fix_field_indexes(&scope, &schema, Expression::column("a", "xa", 0)).unwrap();
        let outer_ref = fix_field_indexes(&scope, &schema, Expression::column("o", "oy", 0)).unwrap();
        assert_eq!(index_of(&inner), 2);
        assert_eq!(index_of(&outer_ref), 1);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let schema = table("a", &["xa"]).schema();
        let err = fix_field_indexes(&Scope::new(), &schema, Expression::column("a", "nope", 0)).unwrap_err();
        assert!(matches!(err, OptimizerError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_unqualified_column_with_two_owners_is_ambiguous() {
        let schema = table("a", &["x"]).schema().concat(&table("b", &["x"]).schema());
        let err = fix_field_indexes(&Scope::new(), &schema, Expression::column("", "x", 0)).unwrap_err();
        assert!(matches!(err, OptimizerError::AmbiguousColumn(_)));

        let qualified = fix_field_indexes(&Scope::new(), &schema, Expression::column("b", "x", 0)).unwrap();
        assert_eq!(index_of(&qualified), 1);
    }

    #[test]
    fn test_fix_up_binds_whole_tree() {
        let ctx = QueryContext::new();
        let plan = LogicalNode::project(
            vec![Expression::column("b", "yb", 0)],
            LogicalNode::filter(
                Expression::column("b", "xb", 0).equals(Expression::literal(1)),
                LogicalNode::join(
                    JoinType::Inner,
                    Expression::literal(true),
                    table("a", &["xa"]),
                    table("b", &["xb", "yb"]),
                ),
            ),
        );
        let fixed = fix_field_indexes_up(&ctx, plan, &Scope::new()).unwrap();
        assert_eq!(index_of(fixed.expressions()[0]), 2);
    }
}
