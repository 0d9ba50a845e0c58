// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query plan optimizers
//!
//! - logical/: Logical rewrite rules (filter, subquery alias and projection pushdown)
//! - physical/: Physical rewrite rules (index selection and conversion)
//! - logical_optimizer.rs: The rule driver running them in order

pub mod logical;
pub mod logical_optimizer;
pub mod physical;

pub use logical_optimizer::{LogicalOptimizer, OptimizationResult, RuleTrace};
