// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Alias map used to rewrite alias-qualified columns to base table names

use std::collections::BTreeMap;
use std::convert::Infallible;

use super::table_access::base_table_node;
use crate::ast::Expression;
use crate::plan::logical::LogicalNode;
use crate::plan::optimizer::{OptimizerError, OptimizerResult};
use crate::plan::transform::inspect;

/// Case-insensitive map from every table or alias name of a query to the
/// name of the node it denotes. Derived tables are not entered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableAliases {
    aliases: BTreeMap<String, String>,
}

impl TableAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the names of every table-like node of `node`
    pub fn from_plan(node: &LogicalNode) -> OptimizerResult<Self> {
        let mut aliases = TableAliases::new();
        let mut failure = None;

        inspect(node, &mut |n| {
            if failure.is_some() {
                return false;
            }
            let added = match n {
                LogicalNode::TableAlias { name, input } => match base_table_node(input).name() {
                    Some(target) => aliases.add(name, target),
                    None => Err(OptimizerError::invalid_node("table aliases", input)),
                },
                LogicalNode::ResolvedTable { .. }
                | LogicalNode::IndexedTableAccess { .. }
                | LogicalNode::ValueDerivedTable { .. }
                | LogicalNode::SubqueryAlias { .. } => match n.name() {
                    Some(name) => aliases.add(name, name),
                    None => Ok(()),
                },
                _ => return true,
            };
            if let Err(e) = added {
                failure = Some(e);
            }
            false
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(aliases),
        }
    }

    /// Register `alias` as a name for `target`. Every name may appear once.
    pub fn add(&mut self, alias: &str, target: &str) -> OptimizerResult<()> {
        let key = alias.to_lowercase();
        if self.aliases.contains_key(&key) {
            return Err(OptimizerError::DuplicateAlias(alias.to_string()));
        }
        self.aliases.insert(key, target.to_string());
        Ok(())
    }

    /// Name of the node `alias` denotes
    pub fn target(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&alias.to_lowercase()).map(|t| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Requalify every column of `expr` with the name its qualifier denotes
    pub fn normalize(&self, expr: Expression) -> Expression {
        fn rewrite(aliases: &TableAliases, e: Expression) -> Result<Expression, Infallible> {
            match e {
                Expression::Column(c) => match aliases.target(&c.table) {
                    Some(target) if target != c.table => {
                        Ok(Expression::Column(c.with_table(target)))
                    }
                    _ => Ok(Expression::Column(c)),
                },
                other => other.map_children(|child| rewrite(aliases, child)),
            }
        }

        match rewrite(self, expr) {
            Ok(e) => e,
            Err(never) => match never {},
        }
    }

    pub fn normalize_all(&self, exprs: &[Expression]) -> Vec<Expression> {
        exprs.iter().map(|e| self.normalize(e.clone())).collect()
    }
}
