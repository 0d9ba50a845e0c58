// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index selection
//!
//! Chooses, per table, an index lookup that covers some of the conjuncts a
//! filter attributes to that table. The choice itself is delegated to an
//! `IndexLookupProvider`; this module only gathers the candidates.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::index_conversion::index_conversion_child_selector;
use crate::ast::{Expression, Operator};
use crate::plan::logical::LogicalNode;
use crate::plan::optimizers::logical::filter_set::FilterSet;
use crate::plan::optimizers::logical::table_access::get_table;
use crate::storage::{IndexAddressableTable, IndexDef, IndexLookup, LookupRange, RangeBound, Value};

/// An index lookup chosen for one table
#[derive(Debug, Clone, PartialEq)]
pub struct IndexLookupDescriptor {
    pub index: IndexDef,
    pub lookup: IndexLookup,
    /// The column expressions the lookup matches, qualified as in the query
    pub key_expressions: Vec<Expression>,
}

/// Lookups keyed by lowercased table or alias name
pub type IndexLookupsByTable = BTreeMap<String, IndexLookupDescriptor>;

/// Chooses an index lookup for a table from the conjuncts attributed to it
pub trait IndexLookupProvider: fmt::Debug + Send + Sync {
    /// `name` is the name the table is addressed by in the query; the
    /// predicates reference only that name.
    fn lookup_for_table(
        &self,
        name: &str,
        table: &dyn IndexAddressableTable,
        predicates: &[Expression],
    ) -> Option<IndexLookupDescriptor>;
}

/// Gather lookups for every index-addressable table reachable below a filter
pub fn index_lookups_by_table(node: &LogicalNode, provider: &dyn IndexLookupProvider) -> IndexLookupsByTable {
    let mut lookups = IndexLookupsByTable::new();
    collect_lookups(node, provider, &mut lookups);
    lookups
}

fn collect_lookups(node: &LogicalNode, provider: &dyn IndexLookupProvider, lookups: &mut IndexLookupsByTable) {
    if let LogicalNode::Filter { condition, input } = node {
        if let Ok(filters) = FilterSet::build(condition) {
            if index_conversion_child_selector(node, input, 0) {
                collect_table_lookups(input, &filters, provider, lookups);
            }
        }
    }
    for (i, child) in node.children().into_iter().enumerate() {
        if index_conversion_child_selector(node, child, i) {
            collect_lookups(child, provider, lookups);
        }
    }
}

fn collect_table_lookups(
    node: &LogicalNode,
    filters: &FilterSet,
    provider: &dyn IndexLookupProvider,
    lookups: &mut IndexLookupsByTable,
) {
    if matches!(node, LogicalNode::ResolvedTable { .. } | LogicalNode::TableAlias { .. }) {
        if let (Some(name), Some(table)) = (node.name(), get_table(node)) {
            let key = name.to_lowercase();
            let predicates = filters.available_for_table(name);
            if let Some(addressable) = table.as_index_addressable() {
                if !predicates.is_empty() && !lookups.contains_key(&key) {
                    if let Some(descriptor) = provider.lookup_for_table(name, addressable, &predicates) {
                        lookups.insert(key, descriptor);
                    }
                }
            }
        }
    }
    for (i, child) in node.children().into_iter().enumerate() {
        if index_conversion_child_selector(node, child, i) {
            collect_table_lookups(child, filters, provider, lookups);
        }
    }
}

/// Matches `column <op> literal` conjuncts against the leading column of
/// each index. Equality wins over ranges; among indexes the first declared
/// one that matches is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjunctIndexSelector;

struct ColumnBounds {
    key: Expression,
    point: Option<Value>,
    lower: Option<RangeBound>,
    upper: Option<RangeBound>,
}

impl ColumnBounds {
    fn new(key: Expression) -> Self {
        Self {
            key,
            point: None,
            lower: None,
            upper: None,
        }
    }

    fn tighten_lower(&mut self, bound: RangeBound) {
        let tighter = match &self.lower {
            None => true,
            Some(current) => match bound.value.compare(&current.value) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => current.inclusive && !bound.inclusive,
                _ => false,
            },
        };
        if tighter {
            self.lower = Some(bound);
        }
    }

    fn tighten_upper(&mut self, bound: RangeBound) {
        let tighter = match &self.upper {
            None => true,
            Some(current) => match bound.value.compare(&current.value) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => current.inclusive && !bound.inclusive,
                _ => false,
            },
        };
        if tighter {
            self.upper = Some(bound);
        }
    }
}

/// `column <op> literal` with the column on the left
fn column_comparison(predicate: &Expression) -> Option<(&Expression, Operator, &Value)> {
    match predicate {
        Expression::Binary(b) if b.operator.is_comparison() => {
            match (b.left.as_ref(), b.right.as_ref()) {
                (column @ Expression::Column(_), Expression::Literal(value)) => {
                    Some((column, b.operator, value))
                }
                (Expression::Literal(value), column @ Expression::Column(_)) => {
                    Some((column, b.operator.mirrored(), value))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

impl ConjunctIndexSelector {
    fn bounds_for(column: &str, predicates: &[Expression]) -> Option<ColumnBounds> {
        let mut bounds: Option<ColumnBounds> = None;
        for predicate in predicates {
            let (key, operator, value) = match column_comparison(predicate) {
                Some(found) => found,
                None => continue,
            };
            let matches_column = matches!(key, Expression::Column(c) if c.name.eq_ignore_ascii_case(column));
            if !matches_column || value.is_null() {
                continue;
            }

            let entry = bounds.get_or_insert_with(|| ColumnBounds::new(key.clone()));
            let bound = |inclusive| RangeBound {
                value: value.clone(),
                inclusive,
            };
            match operator {
                Operator::Equal => {
                    if entry.point.is_none() {
                        entry.point = Some(value.clone());
                    }
                }
                Operator::GreaterThan => entry.tighten_lower(bound(false)),
                Operator::GreaterThanOrEqual => entry.tighten_lower(bound(true)),
                Operator::LessThan => entry.tighten_upper(bound(false)),
                Operator::LessThanOrEqual => entry.tighten_upper(bound(true)),
                _ => {}
            }
        }
        bounds.filter(|b| b.point.is_some() || b.lower.is_some() || b.upper.is_some())
    }
}

impl IndexLookupProvider for ConjunctIndexSelector {
    fn lookup_for_table(
        &self,
        _name: &str,
        table: &dyn IndexAddressableTable,
        predicates: &[Expression],
    ) -> Option<IndexLookupDescriptor> {
        let mut range_candidate: Option<IndexLookupDescriptor> = None;

        for index in table.indexes() {
            let leading = match index.columns.first() {
                Some(column) => column.clone(),
                None => continue,
            };
            let bounds = match Self::bounds_for(&leading, predicates) {
                Some(bounds) => bounds,
                None => continue,
            };

            if let Some(value) = bounds.point {
                return Some(IndexLookupDescriptor {
                    lookup: IndexLookup::point(&index.id, vec![value]),
                    index,
                    key_expressions: vec![bounds.key],
                });
            }
            if range_candidate.is_none() {
                range_candidate = Some(IndexLookupDescriptor {
                    lookup: IndexLookup {
                        index_id: index.id.clone(),
                        range: LookupRange::Range {
                            lower: bounds.lower,
                            upper: bounds.upper,
                        },
                    },
                    index,
                    key_expressions: vec![bounds.key],
                });
            }
        }

        range_candidate
    }
}
