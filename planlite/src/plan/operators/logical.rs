// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical plan nodes
//!
//! A resolved plan is a rooted, ordered tree of `LogicalNode` values. Rewrites
//! never mutate a node in place: they consume the tree and build a new one,
//! reusing whatever subtrees they leave untouched.

use std::fmt;

use crate::ast::Expression;
use crate::schema::{Column, Schema};
use crate::storage::{IndexDef, IndexLookup, TableHandle};

/// Join flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    /// Preserves child 0; child 1 may produce NULLs
    Left,
    /// Preserves child 1; child 0 may produce NULLs
    Right,
}

impl JoinType {
    pub fn is_outer(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Right)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "InnerJoin"),
            JoinType::Left => write!(f, "LeftJoin"),
            JoinType::Right => write!(f, "RightJoin"),
        }
    }
}

/// Marker recording that a rewrite already happened on the wrapped table
#[derive(Debug, Clone, PartialEq)]
pub enum Decoration {
    /// Predicates installed into the table through its filter capability
    FilteredAccess { filters: Vec<Expression> },
    /// Columns installed into the table through its projection capability
    ProjectedAccess { columns: Vec<String> },
}

impl fmt::Display for Decoration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoration::FilteredAccess { filters } => {
                let filters: Vec<String> = filters.iter().map(|e| e.to_string()).collect();
                write!(f, "Filtered table access on [{}]", filters.join(" "))
            }
            Decoration::ProjectedAccess { columns } => {
                write!(f, "Projected table access on [{}]", columns.join(" "))
            }
        }
    }
}

/// Sort key
#[derive(Debug, Clone, PartialEq)]
pub struct SortExpression {
    pub expression: Expression,
    pub ascending: bool,
}

/// Logical plan node
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalNode {
    /// Full scan of a table
    ResolvedTable { table: TableHandle },

    /// Table the resolver could not find
    UnresolvedTable { name: String },

    /// A table (or index access) referred to by another name
    TableAlias {
        name: String,
        input: Box<LogicalNode>,
    },

    /// Scan through an index lookup
    IndexedTableAccess {
        table: TableHandle,
        index: IndexDef,
        lookup: IndexLookup,
        key_expressions: Vec<Expression>,
    },

    /// Literal rows used as a table (`VALUES (...), (...) AS name`)
    ValueDerivedTable {
        name: String,
        schema: Schema,
        rows: Vec<Vec<Expression>>,
    },

    /// Derived table; opaque to outer rewrites
    SubqueryAlias {
        name: String,
        input: Box<LogicalNode>,
    },

    Filter {
        condition: Expression,
        input: Box<LogicalNode>,
    },

    Project {
        expressions: Vec<Expression>,
        input: Box<LogicalNode>,
    },

    Sort {
        expressions: Vec<SortExpression>,
        input: Box<LogicalNode>,
    },

    Limit {
        count: usize,
        offset: usize,
        input: Box<LogicalNode>,
    },

    Join {
        join_type: JoinType,
        condition: Expression,
        left: Box<LogicalNode>,
        right: Box<LogicalNode>,
    },

    /// Join whose secondary side (child 1) is probed through an index per
    /// primary row (child 0)
    IndexedJoin {
        join_type: JoinType,
        condition: Expression,
        left: Box<LogicalNode>,
        right: Box<LogicalNode>,
    },

    /// Transparent wrapper recording a rewrite
    Decorated {
        decoration: Decoration,
        input: Box<LogicalNode>,
    },

    InsertInto {
        table: TableHandle,
        source: Box<LogicalNode>,
    },

    Update {
        assignments: Vec<(String, Expression)>,
        input: Box<LogicalNode>,
    },

    DeleteFrom { input: Box<LogicalNode> },

    CreateTable { name: String, schema: Schema },
}

impl LogicalNode {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn table(table: TableHandle) -> Self {
        LogicalNode::ResolvedTable { table }
    }

    pub fn alias(name: &str, input: LogicalNode) -> Self {
        LogicalNode::TableAlias {
            name: name.to_string(),
            input: Box::new(input),
        }
    }

    pub fn subquery_alias(name: &str, input: LogicalNode) -> Self {
        LogicalNode::SubqueryAlias {
            name: name.to_string(),
            input: Box::new(input),
        }
    }

    pub fn filter(condition: Expression, input: LogicalNode) -> Self {
        LogicalNode::Filter {
            condition,
            input: Box::new(input),
        }
    }

    pub fn project(expressions: Vec<Expression>, input: LogicalNode) -> Self {
        LogicalNode::Project {
            expressions,
            input: Box::new(input),
        }
    }

    pub fn join(join_type: JoinType, condition: Expression, left: LogicalNode, right: LogicalNode) -> Self {
        LogicalNode::Join {
            join_type,
            condition,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn decorated(decoration: Decoration, input: LogicalNode) -> Self {
        LogicalNode::Decorated {
            decoration,
            input: Box::new(input),
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Ordered children
    pub fn children(&self) -> Vec<&LogicalNode> {
        match self {
            LogicalNode::ResolvedTable { .. }
            | LogicalNode::UnresolvedTable { .. }
            | LogicalNode::IndexedTableAccess { .. }
            | LogicalNode::ValueDerivedTable { .. }
            | LogicalNode::CreateTable { .. } => Vec::new(),
            LogicalNode::TableAlias { input, .. }
            | LogicalNode::SubqueryAlias { input, .. }
            | LogicalNode::Filter { input, .. }
            | LogicalNode::Project { input, .. }
            | LogicalNode::Sort { input, .. }
            | LogicalNode::Limit { input, .. }
            | LogicalNode::Decorated { input, .. }
            | LogicalNode::Update { input, .. }
            | LogicalNode::DeleteFrom { input } => vec![input.as_ref()],
            LogicalNode::InsertInto { source, .. } => vec![source.as_ref()],
            LogicalNode::Join { left, right, .. } | LogicalNode::IndexedJoin { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
        }
    }

    /// Rebuild this node with every child passed through `f` along with its
    /// position
    pub fn map_children<E, F>(self, mut f: F) -> Result<LogicalNode, E>
    where
        F: FnMut(usize, LogicalNode) -> Result<LogicalNode, E>,
    {
        let boxed = |f: &mut F, i: usize, n: Box<LogicalNode>| -> Result<Box<LogicalNode>, E> {
            Ok(Box::new(f(i, *n)?))
        };

        Ok(match self {
            LogicalNode::TableAlias { name, input } => LogicalNode::TableAlias {
                name,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::SubqueryAlias { name, input } => LogicalNode::SubqueryAlias {
                name,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::Filter { condition, input } => LogicalNode::Filter {
                condition,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::Project { expressions, input } => LogicalNode::Project {
                expressions,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::Sort { expressions, input } => LogicalNode::Sort {
                expressions,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::Limit {
                count,
                offset,
                input,
            } => LogicalNode::Limit {
                count,
                offset,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::Decorated { decoration, input } => LogicalNode::Decorated {
                decoration,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::Update { assignments, input } => LogicalNode::Update {
                assignments,
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::DeleteFrom { input } => LogicalNode::DeleteFrom {
                input: boxed(&mut f, 0, input)?,
            },
            LogicalNode::InsertInto { table, source } => LogicalNode::InsertInto {
                table,
                source: boxed(&mut f, 0, source)?,
            },
            LogicalNode::Join {
                join_type,
                condition,
                left,
                right,
            } => LogicalNode::Join {
                join_type,
                condition,
                left: boxed(&mut f, 0, left)?,
                right: boxed(&mut f, 1, right)?,
            },
            LogicalNode::IndexedJoin {
                join_type,
                condition,
                left,
                right,
            } => LogicalNode::IndexedJoin {
                join_type,
                condition,
                left: boxed(&mut f, 0, left)?,
                right: boxed(&mut f, 1, right)?,
            },
            leaf => leaf,
        })
    }

    /// Expressions held directly by this node
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            LogicalNode::Filter { condition, .. }
            | LogicalNode::Join { condition, .. }
            | LogicalNode::IndexedJoin { condition, .. } => vec![condition],
            LogicalNode::Project { expressions, .. } => expressions.iter().collect(),
            LogicalNode::Sort { expressions, .. } => {
                expressions.iter().map(|s| &s.expression).collect()
            }
            LogicalNode::IndexedTableAccess {
                key_expressions, ..
            } => key_expressions.iter().collect(),
            LogicalNode::ValueDerivedTable { rows, .. } => rows.iter().flatten().collect(),
            LogicalNode::Update { assignments, .. } => assignments.iter().map(|(_, e)| e).collect(),
            _ => Vec::new(),
        }
    }

    /// Rebuild this node with every direct expression passed through `f`
    pub fn map_expressions<E, F>(self, mut f: F) -> Result<LogicalNode, E>
    where
        F: FnMut(Expression) -> Result<Expression, E>,
    {
        Ok(match self {
            LogicalNode::Filter { condition, input } => LogicalNode::Filter {
                condition: f(condition)?,
                input,
            },
            LogicalNode::Join {
                join_type,
                condition,
                left,
                right,
            } => LogicalNode::Join {
                join_type,
                condition: f(condition)?,
                left,
                right,
            },
            LogicalNode::IndexedJoin {
                join_type,
                condition,
                left,
                right,
            } => LogicalNode::IndexedJoin {
                join_type,
                condition: f(condition)?,
                left,
                right,
            },
            LogicalNode::Project { expressions, input } => LogicalNode::Project {
                expressions: expressions.into_iter().map(&mut f).collect::<Result<_, E>>()?,
                input,
            },
            LogicalNode::Sort { expressions, input } => LogicalNode::Sort {
                expressions: expressions
                    .into_iter()
                    .map(|s| {
                        Ok(SortExpression {
                            expression: f(s.expression)?,
                            ascending: s.ascending,
                        })
                    })
                    .collect::<Result<_, E>>()?,
                input,
            },
            LogicalNode::IndexedTableAccess {
                table,
                index,
                lookup,
                key_expressions,
            } => LogicalNode::IndexedTableAccess {
                table,
                index,
                lookup,
                key_expressions: key_expressions
                    .into_iter()
                    .map(&mut f)
                    .collect::<Result<_, E>>()?,
            },
            LogicalNode::ValueDerivedTable { name, schema, rows } => {
                LogicalNode::ValueDerivedTable {
                    name,
                    schema,
                    rows: rows
                        .into_iter()
                        .map(|row| row.into_iter().map(&mut f).collect::<Result<Vec<_>, E>>())
                        .collect::<Result<_, E>>()?,
                }
            }
            LogicalNode::Update { assignments, input } => LogicalNode::Update {
                assignments: assignments
                    .into_iter()
                    .map(|(column, e)| Ok((column, f(e)?)))
                    .collect::<Result<_, E>>()?,
                input,
            },
            other => other,
        })
    }

    /// Columns this node produces
    pub fn schema(&self) -> Schema {
        match self {
            LogicalNode::ResolvedTable { table } | LogicalNode::IndexedTableAccess { table, .. } => {
                table.schema()
            }
            LogicalNode::TableAlias { name, input } | LogicalNode::SubqueryAlias { name, input } => {
                input.schema().with_source(name)
            }
            LogicalNode::ValueDerivedTable { name, schema, .. } => schema.with_source(name),
            LogicalNode::Filter { input, .. }
            | LogicalNode::Sort { input, .. }
            | LogicalNode::Limit { input, .. }
            | LogicalNode::Decorated { input, .. } => input.schema(),
            LogicalNode::Project { expressions, .. } => Schema::new(
                expressions
                    .iter()
                    .map(|e| match e {
                        Expression::Column(c) => {
                            Column::new(c.name.clone(), c.table.clone(), c.data_type, c.nullable)
                        }
                        other => Column::new(other.output_name(), "", other.data_type(), true),
                    })
                    .collect(),
            ),
            LogicalNode::Join {
                join_type,
                left,
                right,
                ..
            }
            | LogicalNode::IndexedJoin {
                join_type,
                left,
                right,
                ..
            } => match join_type {
                JoinType::Inner => left.schema().concat(&right.schema()),
                JoinType::Left => left.schema().concat(&right.schema().nullable()),
                JoinType::Right => left.schema().nullable().concat(&right.schema()),
            },
            LogicalNode::UnresolvedTable { .. }
            | LogicalNode::InsertInto { .. }
            | LogicalNode::Update { .. }
            | LogicalNode::DeleteFrom { .. }
            | LogicalNode::CreateTable { .. } => Schema::empty(),
        }
    }

    /// Concatenated schemas of all children
    pub fn children_schema(&self) -> Schema {
        self.children()
            .iter()
            .fold(Schema::empty(), |acc, c| acc.concat(&c.schema()))
    }

    /// A tree is resolved when it references no unknown table and no
    /// unbound column anywhere
    pub fn resolved(&self) -> bool {
        if matches!(self, LogicalNode::UnresolvedTable { .. }) {
            return false;
        }
        self.expressions().iter().all(|e| e.resolved())
            && self.children().iter().all(|c| c.resolved())
    }

    /// Name of a table-like node: the alias, or the base table name
    pub fn name(&self) -> Option<&str> {
        match self {
            LogicalNode::ResolvedTable { table } | LogicalNode::IndexedTableAccess { table, .. } => {
                Some(table.name())
            }
            LogicalNode::TableAlias { name, .. }
            | LogicalNode::SubqueryAlias { name, .. }
            | LogicalNode::ValueDerivedTable { name, .. }
            | LogicalNode::UnresolvedTable { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_ddl(&self) -> bool {
        matches!(self, LogicalNode::CreateTable { .. })
    }

    fn label(&self) -> String {
        let list = |exprs: &[Expression]| -> String {
            exprs
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        match self {
            LogicalNode::ResolvedTable { table } => format!("Table({})", table.name()),
            LogicalNode::UnresolvedTable { name } => format!("UnresolvedTable({})", name),
            LogicalNode::TableAlias { name, .. } => format!("TableAlias({})", name),
            LogicalNode::IndexedTableAccess {
                table,
                index,
                lookup,
                ..
            } => format!(
                "IndexedTableAccess({} on [{}] lookup {})",
                table.name(),
                index.expressions().join(","),
                lookup
            ),
            LogicalNode::ValueDerivedTable { name, rows, .. } => {
                format!("Values({}: {} rows)", name, rows.len())
            }
            LogicalNode::SubqueryAlias { name, .. } => format!("SubqueryAlias({})", name),
            LogicalNode::Filter { condition, .. } => format!("Filter{}", wrap(condition)),
            LogicalNode::Project { expressions, .. } => format!("Project({})", list(expressions.as_slice())),
            LogicalNode::Sort { expressions, .. } => format!(
                "Sort({})",
                expressions
                    .iter()
                    .map(|s| format!("{} {}", s.expression, if s.ascending { "ASC" } else { "DESC" }))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            LogicalNode::Limit { count, offset, .. } if *offset > 0 => {
                format!("Limit({} offset {})", count, offset)
            }
            LogicalNode::Limit { count, .. } => format!("Limit({})", count),
            LogicalNode::Join {
                join_type,
                condition,
                ..
            } => format!("{}{}", join_type, wrap(condition)),
            LogicalNode::IndexedJoin {
                join_type,
                condition,
                ..
            } => format!("Indexed{}{}", join_type, wrap(condition)),
            LogicalNode::Decorated { decoration, .. } => decoration.to_string(),
            LogicalNode::InsertInto { table, .. } => format!("InsertInto({})", table.name()),
            LogicalNode::Update { .. } => "Update".to_string(),
            LogicalNode::DeleteFrom { .. } => "Delete".to_string(),
            LogicalNode::CreateTable { name, .. } => format!("CreateTable({})", name),
        }
    }

    fn write_tree(&self, depth: usize, out: &mut Vec<String>) {
        out.push(format!("{}{}", "  ".repeat(depth), self.label()));
        for child in self.children() {
            child.write_tree(depth + 1, out);
        }
    }
}

// Binary expressions already render their own parentheses
fn wrap(e: &Expression) -> String {
    match e {
        Expression::Binary(_) => e.to_string(),
        other => format!("({})", other),
    }
}

impl fmt::Display for LogicalNode {
    /// Indented explain tree, one node per line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        self.write_tree(0, &mut lines);
        write!(f, "{}", lines.join("\n"))
    }
}

/// A logical plan for a single statement
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPlan {
    pub root: LogicalNode,
}

impl LogicalPlan {
    pub fn new(root: LogicalNode) -> Self {
        Self { root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;
    use crate::storage::MemoryTable;

    fn table(name: &str, prefix: char) -> LogicalNode {
        let columns = ['x', 'y', 'z']
            .iter()
            .map(|c| Column::new(format!("{}{}", c, prefix), "", DataType::Integer, false))
            .collect();
        LogicalNode::table(TableHandle::new(MemoryTable::new(name, columns)))
    }

    #[test]
    fn test_left_join_schema_marks_right_side_nullable() {
        let join = LogicalNode::join(
            JoinType::Left,
            Expression::column("a", "xa", 0).equals(Expression::column("b", "xb", 3)),
            table("a", 'a'),
            table("b", 'b'),
        );
        let schema = join.schema();
        assert_eq!(schema.len(), 6);
        assert!(!schema.get(0).unwrap().nullable);
        assert!(schema.get(3).unwrap().nullable);
    }

    #[test]
    fn test_alias_renames_schema_source() {
        let aliased = LogicalNode::alias("t1", table("a", 'a'));
        assert!(aliased.schema().iter().all(|c| c.source == "t1"));
        assert_eq!(aliased.name(), Some("t1"));
    }

    #[test]
    fn test_explain_tree_rendering() {
        let plan = LogicalNode::project(
            vec![Expression::column("a", "xa", 0)],
            LogicalNode::filter(
                Expression::column("a", "ya", 1).equals(Expression::literal(2)),
                table("a", 'a'),
            ),
        );
        assert_eq!(
            plan.to_string(),
            "Project(a.xa)\n  Filter(a.ya = 2)\n    Table(a)"
        );
    }

    #[test]
    fn test_map_children_reports_positions() {
        let join = LogicalNode::join(
            JoinType::Inner,
            Expression::literal(true),
            table("a", 'a'),
            table("b", 'b'),
        );
        let mut seen = Vec::new();
        let rebuilt = join
            .clone()
            .map_children(|i, child| {
                seen.push((i, child.name().map(|n| n.to_string())));
                Ok::<_, ()>(child)
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![(0, Some("a".to_string())), (1, Some("b".to_string()))]
        );
        assert_eq!(rebuilt, join);
    }

    #[test]
    fn test_unresolved_table_makes_tree_unresolved() {
        let plan = LogicalNode::filter(
            Expression::literal(true),
            LogicalNode::UnresolvedTable {
                name: "missing".to_string(),
            },
        );
        assert!(!plan.resolved());
        assert!(table("a", 'a').resolved());
    }
}
