// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! PlanLite - pushdown optimizer for resolved query plans
//!
//! PlanLite rewrites a resolved logical plan so that filter predicates, index
//! lookups and column projections are handled as close to the table scans as
//! possible, without changing query results.
//!
//! # Example
//!
//! ```ignore
//! use planlite::{LogicalOptimizer, OptimizerConfig, QueryContext, Scope};
//!
//! let optimizer = LogicalOptimizer::new(OptimizerConfig::default().with_env_overrides()?);
//! let result = optimizer.optimize(&QueryContext::new(), plan, &Scope::new())?;
//! println!("{}", result.plan.root);
//! ```

pub mod ast;
pub mod plan;
pub mod schema;
pub mod storage;

pub use ast::Expression;
pub use plan::logical::{LogicalNode, LogicalPlan};
pub use plan::optimizers::physical::{ConjunctIndexSelector, IndexLookupProvider};
pub use plan::optimizers::{LogicalOptimizer, OptimizationResult, RuleTrace};
pub use plan::{OptimizationLevel, OptimizerConfig, OptimizerError, OptimizerResult, QueryContext, Scope};
pub use schema::{Column, DataType, Schema};
pub use storage::{MemoryTable, Table, TableError, TableHandle, Value};
