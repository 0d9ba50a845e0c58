// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Optimizer error taxonomy and optimization levels
//!
//! Ambiguous predicate attribution is deliberately absent here: it is never
//! surfaced, the affected filter is just left where it is.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::logical::LogicalNode;
use crate::storage::TableError;

/// Optimization levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    None,  // No rewrites, the resolved tree is returned unchanged
    Basic, // Filter pushdown into tables and below subquery aliases
    #[default]
    Advanced, // Adds index conversion and projection pushdown
    Aggressive, // Same rule set as Advanced
}

impl OptimizationLevel {
    pub fn allows_filter_pushdown(&self) -> bool {
        !matches!(self, OptimizationLevel::None)
    }

    pub fn allows_index_pushdown(&self) -> bool {
        matches!(
            self,
            OptimizationLevel::Advanced | OptimizationLevel::Aggressive
        )
    }

    pub fn allows_projection_pushdown(&self) -> bool {
        self.allows_index_pushdown()
    }
}

impl std::str::FromStr for OptimizationLevel {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(OptimizationLevel::None),
            "basic" => Ok(OptimizationLevel::Basic),
            "advanced" => Ok(OptimizationLevel::Advanced),
            "aggressive" => Ok(OptimizationLevel::Aggressive),
            _ => Err(OptimizerError::InvalidConfig(format!(
                "Unknown optimization level: {}. Valid options: none, basic, advanced, aggressive",
                s
            ))),
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizationLevel::None => "none",
            OptimizationLevel::Basic => "basic",
            OptimizationLevel::Advanced => "advanced",
            OptimizationLevel::Aggressive => "aggressive",
        };
        write!(f, "{}", name)
    }
}

/// Optimizer errors. Any of these aborts the analysis of the whole query.
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// A pass met a node shape it does not support
    #[error("Invalid node type for {rule}: {node}")]
    InvalidNodeType { rule: &'static str, node: String },

    /// A column reference no longer matches any column of the rewritten schema
    #[error("Column '{column}' of table '{table}' not found in schema")]
    ColumnNotFound { table: String, column: String },

    /// An unqualified column reference matches columns of several owners
    #[error("Ambiguous column reference '{0}'")]
    AmbiguousColumn(String),

    /// Two table-like nodes of one query share a name
    #[error("Not unique table/alias: '{0}'")]
    DuplicateAlias(String),

    /// A table rejected a capability call
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Query analysis was cancelled")]
    Cancelled,

    #[error("Invalid optimizer configuration: {0}")]
    InvalidConfig(String),
}

impl OptimizerError {
    pub(crate) fn invalid_node(rule: &'static str, node: &LogicalNode) -> Self {
        let label = node.to_string();
        OptimizerError::InvalidNodeType {
            rule,
            node: label.lines().next().unwrap_or_default().to_string(),
        }
    }
}

pub type OptimizerResult<T> = Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(
            "Advanced".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Advanced
        );
        assert_eq!(
            " none ".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::None
        );
        assert!("turbo".parse::<OptimizationLevel>().is_err());
    }

    #[test]
    fn test_level_rule_gates() {
        assert!(!OptimizationLevel::None.allows_filter_pushdown());
        assert!(OptimizationLevel::Basic.allows_filter_pushdown());
        assert!(!OptimizationLevel::Basic.allows_projection_pushdown());
        assert!(OptimizationLevel::Aggressive.allows_index_pushdown());
    }
}
