// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table interfaces consumed by the optimizer
//!
//! This module provides:
//! - Value and row types
//! - The `Table` trait every table-scan node refers to
//! - Optional capabilities a table may expose: predicate acceptance,
//!   column projection and index addressing
//! - An in-memory table implementing all three capabilities
//!
//! Capabilities are discovered through the `as_*` accessors on `Table`; a
//! table that does not override an accessor simply lacks the capability.

pub mod indexes;
pub mod memory;
pub mod types;

pub use indexes::{IndexDef, IndexLookup, LookupRange, RangeBound};
pub use memory::MemoryTable;
pub use types::{Row, TableError, Value};

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::ast::Expression;
use crate::schema::Schema;

/// A table as seen by the planner
pub trait Table: fmt::Debug + Send + Sync {
    /// Base table name
    fn name(&self) -> &str;

    /// Columns this table produces, owned by `name()`
    fn schema(&self) -> Schema;

    /// Produce all rows. Used by executors, never by optimizer passes.
    fn scan(&self) -> Result<Vec<Row>, TableError>;

    fn as_filtered(&self) -> Option<&dyn FilteredTable> {
        None
    }

    fn as_projected(&self) -> Option<&dyn ProjectedTable> {
        None
    }

    fn as_index_addressable(&self) -> Option<&dyn IndexAddressableTable> {
        None
    }
}

/// Predicate-acceptance capability
pub trait FilteredTable {
    /// The subset of `filters` this table can enforce itself. Filters are
    /// qualified with the base table name.
    fn handled_filters(&self, filters: &[Expression]) -> Vec<Expression>;

    /// A new table value with `filters` installed. Column indexes in
    /// `filters` are fixed against this table's schema.
    fn with_filters(&self, filters: Vec<Expression>) -> Result<TableHandle, TableError>;
}

/// Column-projection capability
pub trait ProjectedTable {
    /// A new table value producing only `columns`
    fn with_projection(&self, columns: &[String]) -> Result<TableHandle, TableError>;

    /// The projection currently installed, if any
    fn projection(&self) -> Option<Vec<String>>;
}

/// Index-addressability capability
pub trait IndexAddressableTable {
    fn indexes(&self) -> Vec<IndexDef>;

    /// A new table value that only produces the rows selected by `lookup`
    fn with_index_lookup(&self, lookup: &IndexLookup) -> Result<TableHandle, TableError>;
}

/// Shared, immutable reference to a table implementation. Two handles are
/// equal when they point at the same table value.
#[derive(Clone)]
pub struct TableHandle(Arc<dyn Table>);

impl TableHandle {
    pub fn new<T: Table + 'static>(table: T) -> Self {
        TableHandle(Arc::new(table))
    }

    pub fn from_arc(table: Arc<dyn Table>) -> Self {
        TableHandle(table)
    }
}

impl Deref for TableHandle {
    type Target = dyn Table;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for TableHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
