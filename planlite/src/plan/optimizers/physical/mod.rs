// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Physical plan optimization rules
//!
//! - index_selection.rs - Choose an index lookup per table from filter conjuncts
//! - index_conversion.rs - Replace full scans with index accesses

pub mod index_conversion;
pub mod index_selection;

pub use index_conversion::{convert_filters_to_indexed_access, index_conversion_child_selector};
pub use index_selection::{
    index_lookups_by_table, ConjunctIndexSelector, IndexLookupDescriptor, IndexLookupProvider,
    IndexLookupsByTable,
};
