// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query plan rewriting
//!
//! This module holds the logical plan representation and the pushdown
//! optimizer that relocates filters, index lookups and projections toward the
//! table scans that can satisfy them.

pub mod config;
pub mod context;
pub mod operators;
pub mod optimizer;
pub mod optimizers;
pub mod scope;
pub mod transform;

pub use config::OptimizerConfig;
pub use context::QueryContext;
pub use operators::logical;
pub use optimizer::{OptimizationLevel, OptimizerError, OptimizerResult};
pub use scope::Scope;
