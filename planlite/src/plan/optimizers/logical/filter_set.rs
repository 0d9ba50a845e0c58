// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Attribution of filter conjuncts to the single table they reference

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ast::Expression;

/// A conjunct whose owning table cannot be determined. Never surfaced:
/// callers leave the filter where it is.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot attribute predicate {conjunct} to a table")]
pub(crate) struct AttributionError {
    pub conjunct: String,
}

/// Conjuncts of one filter node, grouped by the table they exclusively
/// reference, plus the set of conjuncts already relocated.
///
/// Conjuncts referencing several tables, no table at all, or a subquery are
/// kept in `predicates` but never attributed: they stay in the filter.
#[derive(Debug, Clone)]
pub struct FilterSet {
    predicates: Vec<Expression>,
    by_table: BTreeMap<String, Vec<Expression>>,
    handled: Vec<Expression>,
}

impl FilterSet {
    /// Decompose `condition` into its top-level conjuncts and attribute each
    pub(crate) fn build(condition: &Expression) -> Result<Self, AttributionError> {
        let predicates = condition.split_conjunction();
        let mut by_table: BTreeMap<String, Vec<Expression>> = BTreeMap::new();

        for conjunct in &predicates {
            let mut tables: Vec<String> = Vec::new();
            let mut has_subquery = false;
            let mut unowned = false;

            conjunct.inspect(&mut |e| match e {
                Expression::Column(c) if c.table.is_empty() => {
                    unowned = true;
                    false
                }
                Expression::Column(c) => {
                    let table = c.table.to_lowercase();
                    if !tables.contains(&table) {
                        tables.push(table);
                    }
                    true
                }
                Expression::UnresolvedColumn(_) => {
                    unowned = true;
                    false
                }
                Expression::Subquery(_) => {
                    has_subquery = true;
                    false
                }
                _ => true,
            });

            if unowned {
                return Err(AttributionError {
                    conjunct: conjunct.to_string(),
                });
            }

            if tables.len() == 1 && !has_subquery {
                let table = tables.remove(0);
                by_table.entry(table).or_default().push(conjunct.clone());
            }
        }

        Ok(Self {
            predicates,
            by_table,
            handled: Vec::new(),
        })
    }

    /// Not-yet-handled conjuncts attributed to `table`, as written in the query
    pub fn available_for_table(&self, table: &str) -> Vec<Expression> {
        self.by_table
            .get(&table.to_lowercase())
            .map(|filters| {
                filters
                    .iter()
                    .filter(|f| !self.handled.contains(f))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record conjuncts as relocated. Marking twice is a no-op.
    pub fn mark_handled(&mut self, predicates: &[Expression]) {
        for predicate in predicates {
            if !self.handled.contains(predicate) {
                self.handled.push(predicate.clone());
            }
        }
    }

    /// All not-yet-handled conjuncts of the filter, in their original order
    pub fn available_filters(&self) -> Vec<Expression> {
        self.predicates
            .iter()
            .filter(|p| !self.handled.contains(p))
            .cloned()
            .collect()
    }

    pub fn handled_count(&self) -> usize {
        self.handled.len()
    }

    /// Tables with at least one attributed conjunct
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.by_table.keys().map(|t| t.as_str())
    }
}
