// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reading and replacing the table behind a table-like node

use super::field_indexes::fix_field_indexes_for_table_node;
use crate::plan::logical::LogicalNode;
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::scope::Scope;
use crate::storage::TableHandle;

/// The node an alias or decoration chain ends in
pub fn base_table_node(node: &LogicalNode) -> &LogicalNode {
    match node {
        LogicalNode::TableAlias { input, .. } | LogicalNode::Decorated { input, .. } => {
            base_table_node(input)
        }
        other => other,
    }
}

/// The table a table-like node scans, if it scans one
pub fn get_table(node: &LogicalNode) -> Option<TableHandle> {
    match base_table_node(node) {
        LogicalNode::ResolvedTable { table } | LogicalNode::IndexedTableAccess { table, .. } => {
            Some(table.clone())
        }
        _ => None,
    }
}

/// Replace the table at the bottom of an alias or decoration chain. Key
/// expressions of an index access are re-fixed against the new table.
pub fn with_table(node: LogicalNode, table: TableHandle, scope: &Scope) -> OptimizerResult<LogicalNode> {
    match node {
        LogicalNode::ResolvedTable { .. } => Ok(LogicalNode::ResolvedTable { table }),
        LogicalNode::IndexedTableAccess {
            index,
            lookup,
            key_expressions,
            ..
        } => fix_field_indexes_for_table_node(
            LogicalNode::IndexedTableAccess {
                table,
                index,
                lookup,
                key_expressions,
            },
            scope,
        ),
        LogicalNode::TableAlias { name, input } => Ok(LogicalNode::TableAlias {
            name,
            input: Box::new(with_table(*input, table, scope)?),
        }),
        LogicalNode::Decorated { decoration, input } => Ok(LogicalNode::Decorated {
            decoration,
            input: Box::new(with_table(*input, table, scope)?),
        }),
        other => Err(OptimizerError::invalid_node("pushdown", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::logical::Decoration;
    use crate::schema::{Column, DataType};
    use crate::storage::MemoryTable;

    fn handle(name: &str) -> TableHandle {
        TableHandle::new(MemoryTable::new(
            name,
            vec![Column::new("x", "", DataType::Integer, false)],
        ))
    }

    #[test]
    fn test_get_table_sees_through_aliases_and_decorations() {
        let table = handle("a");
        let node = LogicalNode::decorated(
            Decoration::ProjectedAccess {
                columns: vec!["x".to_string()],
            },
            LogicalNode::alias("t1", LogicalNode::table(table.clone())),
        );
        assert_eq!(get_table(&node), Some(table));
        assert!(get_table(&LogicalNode::subquery_alias("sq", LogicalNode::table(handle("b")))).is_none());
    }

    #[test]
    fn test_with_table_keeps_wrappers() {
        let replacement = handle("a");
        let node = LogicalNode::alias("t1", LogicalNode::table(handle("a")));
        let replaced = with_table(node, replacement.clone(), &Scope::new()).unwrap();
        assert_eq!(
            replaced,
            LogicalNode::alias("t1", LogicalNode::table(replacement))
        );
    }

    #[test]
    fn test_with_table_rejects_other_nodes() {
        let node = LogicalNode::subquery_alias("sq", LogicalNode::table(handle("a")));
        let err = with_table(node, handle("a"), &Scope::new()).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidNodeType { .. }));
    }
}
