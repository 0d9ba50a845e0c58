// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical plan optimization rules
//!
//! - predicate_pushdown.rs - Push filters into tables or directly above them
//! - subquery_alias_pushdown.rs - Push filters below derived-table aliases
//! - projection_pushdown.rs - Narrow tables to the columns the query reads
//!
//! The remaining modules are shared helpers: predicate attribution, alias
//! resolution, table replacement and column position fixing.

pub mod field_indexes;
pub mod filter_set;
pub mod predicate_pushdown;
pub mod projection_pushdown;
pub mod subquery_alias_pushdown;
pub mod table_access;
pub mod table_aliases;

pub use filter_set::FilterSet;
pub use predicate_pushdown::{can_do_pushdown, filter_pushdown_child_selector, pushdown_filters};
pub use projection_pushdown::{can_project, fields_by_table, pushdown_projections, FieldsByTable};
pub use subquery_alias_pushdown::pushdown_subquery_alias_filters;
pub use table_aliases::TableAliases;
