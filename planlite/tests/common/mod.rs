// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared fixtures for integration tests
//!
//! Provides the `a`..`d` tables, a binder that fixes column positions of a
//! hand-built plan, and a small reference executor used to compare query
//! results before and after optimization.

#![allow(dead_code)]

use std::cmp::Ordering;

use planlite::plan::logical::JoinType;
use planlite::plan::optimizers::logical::field_indexes::fix_field_indexes_up;
use planlite::plan::transform::inspect;
use planlite::storage::Row;
use planlite::{
    Column, DataType, Expression, LogicalNode, LogicalPlan, MemoryTable, QueryContext, Scope,
    TableError, TableHandle, Value,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Table `name` with integer columns `x<suffix>`, `y<suffix>`, `z<suffix>`,
/// rows (1,2,3) and (4,5,6), and a unique index on `x<suffix>`
pub fn fixture_table(name: &str, suffix: &str) -> MemoryTable {
    let (x, y, z) = (
        format!("x{}", suffix),
        format!("y{}", suffix),
        format!("z{}", suffix),
    );
    int_table(
        name,
        &[x.as_str(), y.as_str(), z.as_str()],
        vec![vec![1, 2, 3], vec![4, 5, 6]],
    )
    .with_index(&format!("{}_pk", name), &[x.as_str()], true)
}

/// Table `name` with integer columns `x<suffix>`, `y<suffix>`, `z<suffix>`
/// holding the single row (1,2,3), indexed on `x<suffix>`
pub fn single_row_table(name: &str, suffix: &str) -> MemoryTable {
    let (x, y, z) = (
        format!("x{}", suffix),
        format!("y{}", suffix),
        format!("z{}", suffix),
    );
    int_table(name, &[x.as_str(), y.as_str(), z.as_str()], vec![vec![1, 2, 3]])
        .with_index(&format!("{}_pk", name), &[x.as_str()], true)
}

pub fn int_table(name: &str, columns: &[&str], rows: Vec<Vec<i64>>) -> MemoryTable {
    MemoryTable::new(
        name,
        columns
            .iter()
            .map(|c| Column::new(*c, "", DataType::Integer, false))
            .collect(),
    )
    .with_rows(
        rows.into_iter()
            .map(|r| r.into_iter().map(Value::Integer).collect())
            .collect(),
    )
}

pub fn scan(table: MemoryTable) -> LogicalNode {
    LogicalNode::table(TableHandle::new(table))
}

pub fn col(table: &str, name: &str) -> Expression {
    Expression::column(table, name, 0)
}

pub fn lit(value: i64) -> Expression {
    Expression::literal(value)
}

/// Fix every column position of a hand-built tree
pub fn bind(node: LogicalNode) -> LogicalPlan {
    LogicalPlan::new(
        fix_field_indexes_up(&QueryContext::new(), node, &Scope::new())
            .expect("plan should bind"),
    )
}

/// Whether any node of the tree satisfies `predicate`
pub fn contains_node(node: &LogicalNode, predicate: &dyn Fn(&LogicalNode) -> bool) -> bool {
    predicate(node) || node.children().into_iter().any(|c| contains_node(c, predicate))
}

/// Plan of the first subquery expression found in the tree
pub fn first_subquery_plan(node: &LogicalNode) -> Option<LogicalNode> {
    let mut found = None;
    inspect(node, &mut |n| {
        for expr in n.expressions() {
            expr.inspect(&mut |e| {
                if let Expression::Subquery(subquery) = e {
                    found = Some((*subquery.plan).clone());
                }
                found.is_none()
            });
        }
        found.is_none()
    });
    found
}

/// Execute a plan with nested loops. Rows come back sorted so results of
/// differently shaped plans compare equal.
pub fn execute_sorted(plan: &LogicalPlan) -> Vec<Row> {
    let mut rows = execute(&plan.root).expect("plan should execute");
    rows.sort_by(|l, r| compare_rows(l, r));
    rows
}

fn compare_rows(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right) {
        match (l.is_null(), r.is_null()) {
            (true, true) => continue,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match l.compare(r) {
            Some(Ordering::Equal) | None => continue,
            Some(other) => return other,
        }
    }
    left.len().cmp(&right.len())
}

fn nulls(width: usize) -> Row {
    vec![Value::Null; width]
}

pub fn execute(node: &LogicalNode) -> Result<Vec<Row>, TableError> {
    match node {
        LogicalNode::ResolvedTable { table } | LogicalNode::IndexedTableAccess { table, .. } => {
            table.scan()
        }
        LogicalNode::ValueDerivedTable { rows, .. } => rows
            .iter()
            .map(|row| row.iter().map(|e| e.evaluate(&[])).collect::<Result<Row, _>>())
            .collect(),
        LogicalNode::TableAlias { input, .. }
        | LogicalNode::SubqueryAlias { input, .. }
        | LogicalNode::Decorated { input, .. } => execute(input),
        LogicalNode::Filter { condition, input } => {
            let mut result = Vec::new();
            for row in execute(input)? {
                if condition.evaluate(&row)?.is_true() {
                    result.push(row);
                }
            }
            Ok(result)
        }
        LogicalNode::Project { expressions, input } => execute(input)?
            .iter()
            .map(|row| expressions.iter().map(|e| e.evaluate(row)).collect::<Result<Row, _>>())
            .collect(),
        LogicalNode::Sort { expressions, input } => {
            let mut keyed = Vec::new();
            for row in execute(input)? {
                let key = expressions
                    .iter()
                    .map(|s| s.expression.evaluate(&row))
                    .collect::<Result<Vec<_>, _>>()?;
                keyed.push((key, row));
            }
            keyed.sort_by(|(l, _), (r, _)| {
                for (i, s) in expressions.iter().enumerate() {
                    let ordering = compare_rows(&l[i..=i], &r[i..=i]);
                    if ordering != Ordering::Equal {
                        return if s.ascending { ordering } else { ordering.reverse() };
                    }
                }
                Ordering::Equal
            });
            Ok(keyed.into_iter().map(|(_, row)| row).collect())
        }
        LogicalNode::Limit {
            count,
            offset,
            input,
        } => Ok(execute(input)?.into_iter().skip(*offset).take(*count).collect()),
        LogicalNode::Join {
            join_type,
            condition,
            left,
            right,
        }
        | LogicalNode::IndexedJoin {
            join_type,
            condition,
            left,
            right,
        } => {
            let left_rows = execute(left)?;
            let right_rows = execute(right)?;
            let (left_width, right_width) = (left.schema().len(), right.schema().len());
            let mut result = Vec::new();

            match join_type {
                JoinType::Right => {
                    for r in &right_rows {
                        let mut matched = false;
                        for l in &left_rows {
                            let row: Row = l.iter().chain(r).cloned().collect();
                            if condition.evaluate(&row)?.is_true() {
                                matched = true;
                                result.push(row);
                            }
                        }
                        if !matched {
                            result.push(nulls(left_width).into_iter().chain(r.iter().cloned()).collect());
                        }
                    }
                }
                join_type => {
                    for l in &left_rows {
                        let mut matched = false;
                        for r in &right_rows {
                            let row: Row = l.iter().chain(r).cloned().collect();
                            if condition.evaluate(&row)?.is_true() {
                                matched = true;
                                result.push(row);
                            }
                        }
                        if !matched && join_type.is_outer() {
                            result.push(l.iter().cloned().chain(nulls(right_width)).collect());
                        }
                    }
                }
            }
            Ok(result)
        }
        other => Err(TableError::Evaluation(format!(
            "cannot execute node {}",
            other
        ))),
    }
}
