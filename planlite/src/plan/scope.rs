// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lexical scope of outer-query columns

use super::logical::LogicalNode;
use crate::schema::Schema;

/// Outer query nodes visible to a correlated subquery, innermost first.
///
/// Column positions inside a subquery are computed against the scope schema
/// followed by the schema of the node's children, so an outer column keeps a
/// stable position while the subquery itself is rewritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    nodes: Vec<LogicalNode>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope one level deeper, with `node` as the innermost outer node
    pub fn new_scope(&self, node: LogicalNode) -> Scope {
        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.push(node);
        nodes.extend(self.nodes.iter().cloned());
        Scope { nodes }
    }

    pub fn nodes(&self) -> &[LogicalNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Schema of all outer columns: each scope node's children schema, innermost first
    pub fn schema(&self) -> Schema {
        self.nodes
            .iter()
            .fold(Schema::empty(), |acc, n| acc.concat(&n.children_schema()))
    }
}
