// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Column descriptors and node schemas
//!
//! A schema is the ordered list of columns a plan node produces. Column
//! references cache a position into the schema of the node directly below
//! the expression that holds them, so every restructuring of the tree has
//! to recompute those positions against the new schemas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column data types understood by the optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Null,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "INT",
            DataType::Float => "FLOAT",
            DataType::Text => "TEXT",
            DataType::Boolean => "BOOLEAN",
            DataType::Null => "NULL",
        };
        write!(f, "{}", name)
    }
}

/// A single column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Owning table or alias name
    pub source: String,
    /// Column type
    pub data_type: DataType,
    /// Whether the column may hold NULL
    pub nullable: bool,
}

impl Column {
    /// Create a new column descriptor
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        data_type: DataType,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            data_type,
            nullable,
        }
    }

    /// Case-insensitive match on owner and name. An empty `source` matches any owner.
    pub fn matches(&self, source: &str, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            && (source.is_empty() || self.source.eq_ignore_ascii_case(source))
    }

    /// Copy of this column owned by another table or alias
    pub fn with_source(&self, source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..self.clone()
        }
    }
}

/// Ordered sequence of columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Position of the first column matching `source` and `name`
    pub fn index_of(&self, source: &str, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.matches(source, name))
    }

    /// Concatenate two schemas, `self` first
    pub fn concat(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }

    /// Same columns, all owned by `source`
    pub fn with_source(&self, source: &str) -> Schema {
        Schema {
            columns: self.columns.iter().map(|c| c.with_source(source)).collect(),
        }
    }

    /// Same columns, all marked nullable (the null-producing side of an outer join)
    pub fn nullable(&self) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    nullable: true,
                    ..c.clone()
                })
                .collect(),
        }
    }

    /// Keep only the named columns, in schema order
    pub fn project(&self, names: &[String]) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .filter(|c| names.iter().any(|n| n.eq_ignore_ascii_case(&c.name)))
                .cloned()
                .collect(),
        }
    }
}

impl From<Vec<Column>> for Schema {
    fn from(columns: Vec<Column>) -> Self {
        Schema::new(columns)
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
