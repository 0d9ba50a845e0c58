// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row-level expression evaluation
//!
//! Table implementations that accept pushed-down predicates or index lookups
//! need to evaluate expressions against their own rows. Column references are
//! read through their cached index, so expressions must be fixed against the
//! table schema before they are evaluated.

use std::cmp::Ordering;

use super::expression::{BinaryExpression, Expression, Operator};
use crate::storage::{TableError, Value};

impl Expression {
    /// Evaluate this expression against a row laid out by the schema its
    /// column indexes were fixed against
    pub fn evaluate(&self, row: &[Value]) -> Result<Value, TableError> {
        match self {
            Expression::Column(c) => row.get(c.index).cloned().ok_or_else(|| {
                TableError::Evaluation(format!(
                    "column {}.{} has index {} but row has {} values",
                    c.table,
                    c.name,
                    c.index,
                    row.len()
                ))
            }),
            Expression::UnresolvedColumn(c) => Err(TableError::Evaluation(format!(
                "unresolved column {}",
                c.name
            ))),
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Binary(b) => evaluate_binary(b, row),
            Expression::Not(e) => Ok(match e.evaluate(row)? {
                Value::Boolean(b) => Value::Boolean(!b),
                _ => Value::Null,
            }),
            Expression::IsNull(e) => Ok(Value::Boolean(e.evaluate(row)?.is_null())),
            Expression::FunctionCall(func) => {
                let args = func
                    .arguments
                    .iter()
                    .map(|a| a.evaluate(row))
                    .collect::<Result<Vec<_>, _>>()?;
                evaluate_function(&func.name, args)
            }
            Expression::Alias(a) => a.expression.evaluate(row),
            Expression::Subquery(_) => Err(TableError::Evaluation(
                "subquery expressions cannot be evaluated per row".to_string(),
            )),
        }
    }
}

fn evaluate_binary(b: &BinaryExpression, row: &[Value]) -> Result<Value, TableError> {
    let left = b.left.evaluate(row)?;

    // Three-valued logic with short circuit
    match b.operator {
        Operator::And => {
            if left == Value::Boolean(false) {
                return Ok(Value::Boolean(false));
            }
            let right = b.right.evaluate(row)?;
            return Ok(match (left, right) {
                (_, Value::Boolean(false)) => Value::Boolean(false),
                (Value::Boolean(true), Value::Boolean(true)) => Value::Boolean(true),
                _ => Value::Null,
            });
        }
        Operator::Or => {
            if left == Value::Boolean(true) {
                return Ok(Value::Boolean(true));
            }
            let right = b.right.evaluate(row)?;
            return Ok(match (left, right) {
                (_, Value::Boolean(true)) => Value::Boolean(true),
                (Value::Boolean(false), Value::Boolean(false)) => Value::Boolean(false),
                _ => Value::Null,
            });
        }
        _ => {}
    }

    let right = b.right.evaluate(row)?;
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    if b.operator.is_comparison() {
        let ordering = match left.compare(&right) {
            Some(o) => o,
            None => return Ok(Value::Null),
        };
        let result = match b.operator {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::LessThanOrEqual => ordering != Ordering::Greater,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::GreaterThanOrEqual => ordering != Ordering::Less,
            _ => unreachable!("checked by is_comparison"),
        };
        return Ok(Value::Boolean(result));
    }

    evaluate_arithmetic(b.operator, left, right)
}

fn evaluate_arithmetic(op: Operator, left: Value, right: Value) -> Result<Value, TableError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => match op {
            Operator::Plus => Ok(Value::Integer(a.wrapping_add(b))),
            Operator::Minus => Ok(Value::Integer(a.wrapping_sub(b))),
            Operator::Multiply => Ok(Value::Integer(a.wrapping_mul(b))),
            Operator::Divide if b == 0 => Ok(Value::Null),
            Operator::Divide => Ok(Value::Float(a as f64 / b as f64)),
            _ => Err(TableError::Evaluation(format!(
                "operator {} is not arithmetic",
                op
            ))),
        },
        (l, r) => {
            let (a, b) = match (as_float(&l), as_float(&r)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(TableError::Evaluation(format!(
                        "cannot apply {} to {} and {}",
                        op, l, r
                    )))
                }
            };
            match op {
                Operator::Plus => Ok(Value::Float(a + b)),
                Operator::Minus => Ok(Value::Float(a - b)),
                Operator::Multiply => Ok(Value::Float(a * b)),
                Operator::Divide if b == 0.0 => Ok(Value::Null),
                Operator::Divide => Ok(Value::Float(a / b)),
                _ => Err(TableError::Evaluation(format!(
                    "operator {} is not arithmetic",
                    op
                ))),
            }
        }
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

// Only the handful of functions table implementations need to evaluate
// pushed predicates. The full function catalog lives outside the optimizer.
fn evaluate_function(name: &str, args: Vec<Value>) -> Result<Value, TableError> {
    match (name.to_lowercase().as_str(), args.as_slice()) {
        ("abs", [Value::Integer(i)]) => Ok(Value::Integer(i.wrapping_abs())),
        ("abs", [Value::Float(f)]) => Ok(Value::Float(f.abs())),
        ("abs", [Value::Null]) => Ok(Value::Null),
        ("lower", [Value::Text(s)]) => Ok(Value::Text(s.to_lowercase())),
        ("upper", [Value::Text(s)]) => Ok(Value::Text(s.to_uppercase())),
        ("lower" | "upper", [Value::Null]) => Ok(Value::Null),
        ("coalesce", values) => Ok(values
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        (other, _) => Err(TableError::Evaluation(format!(
            "function {} is not supported here",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_against_null_is_null() {
        let expr = Expression::column("t", "a", 0).equals(Expression::literal(1));
        assert_eq!(expr.evaluate(&[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_and_with_false_short_circuits_null() {
        let expr = Expression::literal(false).and(Expression::literal(Value::Null));
        assert_eq!(expr.evaluate(&[]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_arithmetic_in_predicate() {
        // ya - 1 = xb over the row (ya=2, xb=1)
        let expr = Expression::binary(
            Expression::column("a", "ya", 0),
            Operator::Minus,
            Expression::literal(1),
        )
        .equals(Expression::column("b", "xb", 1));
        let row = vec![Value::Integer(2), Value::Integer(1)];
        assert!(expr.evaluate(&row).unwrap().is_true());
    }

    #[test]
    fn test_out_of_range_column_is_an_error() {
        let expr = Expression::column("t", "a", 3);
        assert!(expr.evaluate(&[Value::Integer(1)]).is_err());
    }
}
