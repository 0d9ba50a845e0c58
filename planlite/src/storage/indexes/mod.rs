// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index descriptors for index-addressable tables
//!
//! The optimizer never reads index data. It only needs to know which indexes a
//! table exposes and how to describe a lookup against one of them; the table
//! implementation performs the lookup when it is scanned.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::Value;

/// An index exposed by a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index identifier, unique per table
    pub id: String,
    /// Table the index belongs to
    pub table: String,
    /// Key columns, in key order
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(id: &str, table: &str, columns: &[&str], unique: bool) -> Self {
        Self {
            id: id.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        }
    }

    /// Qualified key expressions as rendered in explain output (`a.xa`)
    pub fn expressions(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{}.{}", self.table, c))
            .collect()
    }
}

/// One end of a range lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub value: Value,
    pub inclusive: bool,
}

/// Values an index lookup selects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LookupRange {
    /// Exact key match
    Point(Vec<Value>),
    /// Range over the first key column
    Range {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
}

/// A prepared lookup against one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLookup {
    pub index_id: String,
    pub range: LookupRange,
}

impl IndexLookup {
    pub fn point(index_id: &str, values: Vec<Value>) -> Self {
        Self {
            index_id: index_id.to_string(),
            range: LookupRange::Point(values),
        }
    }

    /// Whether a row whose index key is `key` is selected by this lookup
    pub fn matches(&self, key: &[Value]) -> bool {
        match &self.range {
            LookupRange::Point(values) => {
                values.len() <= key.len()
                    && values
                        .iter()
                        .zip(key)
                        .all(|(v, k)| v.compare(k) == Some(Ordering::Equal))
            }
            LookupRange::Range { lower, upper } => {
                let first = match key.first() {
                    Some(k) if !k.is_null() => k,
                    _ => return false,
                };
                let above_lower = lower.as_ref().map_or(true, |b| {
                    match first.compare(&b.value) {
                        Some(Ordering::Greater) => true,
                        Some(Ordering::Equal) => b.inclusive,
                        _ => false,
                    }
                });
                let below_upper = upper.as_ref().map_or(true, |b| {
                    match first.compare(&b.value) {
                        Some(Ordering::Less) => true,
                        Some(Ordering::Equal) => b.inclusive,
                        _ => false,
                    }
                });
                above_lower && below_upper
            }
        }
    }
}

impl fmt::Display for IndexLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            LookupRange::Point(values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", values.join(", "))
            }
            LookupRange::Range { lower, upper } => {
                match lower {
                    Some(b) if b.inclusive => write!(f, "[{}", b.value)?,
                    Some(b) => write!(f, "({}", b.value)?,
                    None => write!(f, "(-∞")?,
                }
                write!(f, ", ")?;
                match upper {
                    Some(b) if b.inclusive => write!(f, "{}]", b.value),
                    Some(b) => write!(f, "{})", b.value),
                    None => write!(f, "∞)"),
                }
            }
        }
    }
}
