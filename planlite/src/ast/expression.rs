// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar expression tree
//!
//! Expressions reach the optimizer already resolved: every column reference
//! carries its owning table (or alias) and a cached position into the schema
//! of the node below the expression. The cached position is only valid until
//! the tree is restructured; the field-index fixup recomputes it.

use std::fmt;

use crate::plan::logical::LogicalNode;
use crate::schema::DataType;
use crate::storage::Value;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl Operator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
                | Operator::GreaterThan
                | Operator::GreaterThanOrEqual
        )
    }

    /// The operator obtained by swapping operands (`a < b` == `b > a`)
    pub fn mirrored(&self) -> Operator {
        match self {
            Operator::LessThan => Operator::GreaterThan,
            Operator::LessThanOrEqual => Operator::GreaterThanOrEqual,
            Operator::GreaterThan => Operator::LessThan,
            Operator::GreaterThanOrEqual => Operator::LessThanOrEqual,
            other => *other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        };
        write!(f, "{}", symbol)
    }
}

/// Resolved column reference
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Owning table or alias; empty when the resolver left it unqualified
    pub table: String,
    pub name: String,
    /// Cached position into the schema below the owning node
    pub index: usize,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, name: impl Into<String>, index: usize) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            index,
            data_type: DataType::Integer,
            nullable: true,
        }
    }

    pub fn with_table(&self, table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }
}

/// Column reference the resolver could not bind
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedColumn {
    pub table: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub left: Box<Expression>,
    pub operator: Operator,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasExpression {
    pub expression: Box<Expression>,
    pub name: String,
}

/// A subquery used as a scalar/boolean expression. Its plan is analyzed on its
/// own, with the enclosing query as outer scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpression {
    pub plan: Box<LogicalNode>,
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(ColumnRef),
    UnresolvedColumn(UnresolvedColumn),
    Literal(Value),
    Binary(BinaryExpression),
    Not(Box<Expression>),
    IsNull(Box<Expression>),
    FunctionCall(FunctionCall),
    Alias(AliasExpression),
    Subquery(SubqueryExpression),
}

impl Expression {
    pub fn column(table: &str, name: &str, index: usize) -> Expression {
        Expression::Column(ColumnRef::new(table, name, index))
    }

    pub fn literal(value: impl Into<Value>) -> Expression {
        Expression::Literal(value.into())
    }

    pub fn binary(left: Expression, operator: Operator, right: Expression) -> Expression {
        Expression::Binary(BinaryExpression {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    pub fn equals(self, other: Expression) -> Expression {
        Expression::binary(self, Operator::Equal, other)
    }

    pub fn and(self, other: Expression) -> Expression {
        Expression::binary(self, Operator::And, other)
    }

    pub fn or(self, other: Expression) -> Expression {
        Expression::binary(self, Operator::Or, other)
    }

    pub fn alias(self, name: &str) -> Expression {
        Expression::Alias(AliasExpression {
            expression: Box::new(self),
            name: name.to_string(),
        })
    }

    /// Direct child expressions. Subquery plans are not expression children.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Binary(b) => vec![b.left.as_ref(), b.right.as_ref()],
            Expression::Not(e) | Expression::IsNull(e) => vec![e.as_ref()],
            Expression::FunctionCall(f) => f.arguments.iter().collect(),
            Expression::Alias(a) => vec![a.expression.as_ref()],
            Expression::Column(_)
            | Expression::UnresolvedColumn(_)
            | Expression::Literal(_)
            | Expression::Subquery(_) => Vec::new(),
        }
    }

    /// Rebuild this expression with every direct child passed through `f`
    pub fn map_children<E, F>(self, mut f: F) -> Result<Expression, E>
    where
        F: FnMut(Expression) -> Result<Expression, E>,
    {
        Ok(match self {
            Expression::Binary(b) => Expression::Binary(BinaryExpression {
                left: Box::new(f(*b.left)?),
                operator: b.operator,
                right: Box::new(f(*b.right)?),
            }),
            Expression::Not(e) => Expression::Not(Box::new(f(*e)?)),
            Expression::IsNull(e) => Expression::IsNull(Box::new(f(*e)?)),
            Expression::FunctionCall(func) => Expression::FunctionCall(FunctionCall {
                name: func.name,
                arguments: func
                    .arguments
                    .into_iter()
                    .map(&mut f)
                    .collect::<Result<Vec<_>, E>>()?,
            }),
            Expression::Alias(a) => Expression::Alias(AliasExpression {
                expression: Box::new(f(*a.expression)?),
                name: a.name,
            }),
            leaf => leaf,
        })
    }

    /// Visit this expression and its descendants, parents first. Returning
    /// `false` from `f` stops descent below that expression.
    pub fn inspect<F>(&self, f: &mut F)
    where
        F: FnMut(&Expression) -> bool,
    {
        if f(self) {
            for child in self.children() {
                child.inspect(f);
            }
        }
    }

    /// All column references in this expression, in visit order
    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        fn collect<'a>(e: &'a Expression, out: &mut Vec<&'a ColumnRef>) {
            if let Expression::Column(c) = e {
                out.push(c);
            }
            for child in e.children() {
                collect(child, out);
            }
        }
        let mut refs = Vec::new();
        collect(self, &mut refs);
        refs
    }

    /// An expression is resolved when it has no unbound columns, including
    /// inside subquery plans
    pub fn resolved(&self) -> bool {
        match self {
            Expression::UnresolvedColumn(_) => false,
            Expression::Subquery(s) => s.plan.resolved(),
            other => other.children().iter().all(|c| c.resolved()),
        }
    }

    /// Split a predicate into its top-level AND conjuncts
    pub fn split_conjunction(&self) -> Vec<Expression> {
        match self {
            Expression::Binary(BinaryExpression {
                left,
                operator: Operator::And,
                right,
            }) => {
                let mut conjuncts = left.split_conjunction();
                conjuncts.extend(right.split_conjunction());
                conjuncts
            }
            other => vec![other.clone()],
        }
    }

    /// Join predicates with AND, left-deep, preserving order. `None` when empty.
    pub fn join_and(predicates: Vec<Expression>) -> Option<Expression> {
        predicates.into_iter().reduce(|acc, p| acc.and(p))
    }

    /// Type of the value this expression produces
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Column(c) => c.data_type,
            Expression::Literal(v) => v.data_type(),
            Expression::Binary(b) if b.operator.is_comparison() => DataType::Boolean,
            Expression::Binary(b) if matches!(b.operator, Operator::And | Operator::Or) => {
                DataType::Boolean
            }
            Expression::Binary(b) => b.left.data_type(),
            Expression::Not(_) | Expression::IsNull(_) => DataType::Boolean,
            Expression::Alias(a) => a.expression.data_type(),
            Expression::UnresolvedColumn(_)
            | Expression::FunctionCall(_)
            | Expression::Subquery(_) => DataType::Null,
        }
    }

    /// Name this expression contributes to a projection schema
    pub fn output_name(&self) -> String {
        match self {
            Expression::Column(c) => c.name.clone(),
            Expression::Alias(a) => a.name.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(c) if c.table.is_empty() => write!(f, "{}", c.name),
            Expression::Column(c) => write!(f, "{}.{}", c.table, c.name),
            Expression::UnresolvedColumn(c) => match &c.table {
                Some(t) => write!(f, "{}.{}", t, c.name),
                None => write!(f, "{}", c.name),
            },
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Binary(b) => write!(f, "({} {} {})", b.left, b.operator, b.right),
            Expression::Not(e) => write!(f, "NOT {}", e),
            Expression::IsNull(e) => write!(f, "{} IS NULL", e),
            Expression::FunctionCall(func) => {
                let args: Vec<String> = func.arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", func.name, args.join(", "))
            }
            Expression::Alias(a) => write!(f, "{} as {}", a.expression, a.name),
            Expression::Subquery(_) => write!(f, "(subquery)"),
        }
    }
}
