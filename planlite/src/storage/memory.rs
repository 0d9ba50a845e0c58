// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory table with every optional capability
//!
//! Rows live behind a shared lock so that the table values produced by
//! `with_filters`, `with_projection` and `with_index_lookup` all read the same
//! data. Pushed predicates and lookups are always evaluated against the full
//! row before the projection is applied.

use parking_lot::RwLock;
use std::sync::Arc;

use super::{
    FilteredTable, IndexAddressableTable, IndexDef, IndexLookup, ProjectedTable, Row, Table,
    TableError, TableHandle, Value,
};
use crate::ast::{Expression, Operator};
use crate::schema::{Column, Schema};

/// Which pushed-down predicates a memory table agrees to enforce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterSupport {
    /// Every predicate over this table's own columns
    #[default]
    All,
    /// Only `column = literal` comparisons
    EqualityOnly,
    /// No predicates; the table still advertises the capability
    Nothing,
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    schema: Schema,
    rows: Arc<RwLock<Vec<Row>>>,
    indexes: Vec<IndexDef>,
    filter_support: FilterSupport,
    filters: Vec<Expression>,
    projection: Option<Vec<String>>,
    lookup: Option<IndexLookup>,
}

impl MemoryTable {
    /// Create an empty table. Column owners are rewritten to `name`.
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        let schema = Schema::new(columns.iter().map(|c| c.with_source(name)).collect());
        Self {
            name: name.to_string(),
            schema,
            rows: Arc::new(RwLock::new(Vec::new())),
            indexes: Vec::new(),
            filter_support: FilterSupport::default(),
            filters: Vec::new(),
            projection: None,
            lookup: None,
        }
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.rows.write().extend(rows);
        self
    }

    pub fn with_index(mut self, id: &str, columns: &[&str], unique: bool) -> Self {
        self.indexes
            .push(IndexDef::new(id, &self.name, columns, unique));
        self
    }

    pub fn with_filter_support(mut self, support: FilterSupport) -> Self {
        self.filter_support = support;
        self
    }

    pub fn insert(&self, row: Row) {
        self.rows.write().push(row);
    }

    /// Predicates currently installed
    pub fn filters(&self) -> &[Expression] {
        &self.filters
    }

    /// Index lookup currently installed
    pub fn lookup(&self) -> Option<&IndexLookup> {
        self.lookup.as_ref()
    }

    fn owns_all_columns(&self, expr: &Expression) -> bool {
        let mut owned = true;
        expr.inspect(&mut |e| match e {
            Expression::Column(c) => {
                owned &= c.table.eq_ignore_ascii_case(&self.name)
                    && self.schema.index_of("", &c.name).is_some();
                true
            }
            Expression::Subquery(_) | Expression::UnresolvedColumn(_) => {
                owned = false;
                false
            }
            _ => true,
        });
        owned
    }

    fn supports(&self, expr: &Expression) -> bool {
        if !self.owns_all_columns(expr) {
            return false;
        }
        match self.filter_support {
            FilterSupport::All => true,
            FilterSupport::Nothing => false,
            FilterSupport::EqualityOnly => matches!(
                expr,
                Expression::Binary(b)
                    if b.operator == Operator::Equal
                        && matches!(
                            (b.left.as_ref(), b.right.as_ref()),
                            (Expression::Column(_), Expression::Literal(_))
                                | (Expression::Literal(_), Expression::Column(_))
                        )
            ),
        }
    }

    // Pushed predicates are evaluated against full rows, whatever schema the
    // caller fixed them against.
    fn bind_to_full_schema(&self, expr: Expression) -> Result<Expression, TableError> {
        fn bind(table: &MemoryTable, e: Expression) -> Result<Expression, TableError> {
            match e {
                Expression::Column(c) => {
                    let index = table.schema.index_of("", &c.name).ok_or_else(|| {
                        TableError::ColumnNotFound {
                            table: table.name.clone(),
                            column: c.name.clone(),
                        }
                    })?;
                    Ok(Expression::Column(c.with_index(index)))
                }
                other => other.map_children(|child| bind(table, child)),
            }
        }
        bind(self, expr)
    }

    fn full_index(&self, column: &str) -> Result<usize, TableError> {
        self.schema
            .index_of("", column)
            .ok_or_else(|| TableError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    fn lookup_key(&self, lookup: &IndexLookup, row: &[Value]) -> Result<Vec<Value>, TableError> {
        let index = self
            .indexes
            .iter()
            .find(|i| i.id == lookup.index_id)
            .ok_or_else(|| TableError::IndexNotFound {
                table: self.name.clone(),
                index: lookup.index_id.clone(),
            })?;
        index
            .columns
            .iter()
            .map(|c| self.value_at(row, self.full_index(c)?))
            .collect()
    }

    // Rows are not checked against the schema when they are added
    fn value_at(&self, row: &[Value], index: usize) -> Result<Value, TableError> {
        row.get(index).cloned().ok_or_else(|| {
            TableError::Evaluation(format!(
                "table {} has no value at position {} of a row with {} values",
                self.name,
                index,
                row.len()
            ))
        })
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Schema {
        match &self.projection {
            Some(columns) => self.schema.project(columns),
            None => self.schema.clone(),
        }
    }

    fn scan(&self) -> Result<Vec<Row>, TableError> {
        let projected: Option<Vec<usize>> = match &self.projection {
            Some(columns) => Some(
                self.schema
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| columns.iter().any(|p| p.eq_ignore_ascii_case(&c.name)))
                    .map(|(i, _)| i)
                    .collect(),
            ),
            None => None,
        };

        let rows = self.rows.read();
        let mut result = Vec::new();
        'rows: for row in rows.iter() {
            if let Some(lookup) = &self.lookup {
                if !lookup.matches(&self.lookup_key(lookup, row)?) {
                    continue;
                }
            }
            for filter in &self.filters {
                if !filter.evaluate(row)?.is_true() {
                    continue 'rows;
                }
            }
            result.push(match &projected {
                Some(indexes) => indexes
                    .iter()
                    .map(|i| self.value_at(row, *i))
                    .collect::<Result<Row, _>>()?,
                None => row.clone(),
            });
        }
        Ok(result)
    }

    fn as_filtered(&self) -> Option<&dyn FilteredTable> {
        Some(self)
    }

    fn as_projected(&self) -> Option<&dyn ProjectedTable> {
        Some(self)
    }

    fn as_index_addressable(&self) -> Option<&dyn IndexAddressableTable> {
        if self.indexes.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl FilteredTable for MemoryTable {
    fn handled_filters(&self, filters: &[Expression]) -> Vec<Expression> {
        filters
            .iter()
            .filter(|f| self.supports(f))
            .cloned()
            .collect()
    }

    fn with_filters(&self, filters: Vec<Expression>) -> Result<TableHandle, TableError> {
        let mut table = self.clone();
        for filter in filters {
            if !self.supports(&filter) {
                return Err(TableError::Rejected {
                    table: self.name.clone(),
                    reason: format!("cannot enforce filter {}", filter),
                });
            }
            table.filters.push(self.bind_to_full_schema(filter)?);
        }
        Ok(TableHandle::new(table))
    }
}

impl ProjectedTable for MemoryTable {
    fn with_projection(&self, columns: &[String]) -> Result<TableHandle, TableError> {
        for column in columns {
            self.full_index(column)?;
        }
        let mut table = self.clone();
        table.projection = Some(columns.to_vec());
        Ok(TableHandle::new(table))
    }

    fn projection(&self) -> Option<Vec<String>> {
        self.projection.clone()
    }
}

impl IndexAddressableTable for MemoryTable {
    fn indexes(&self) -> Vec<IndexDef> {
        self.indexes.clone()
    }

    fn with_index_lookup(&self, lookup: &IndexLookup) -> Result<TableHandle, TableError> {
        if !self.indexes.iter().any(|i| i.id == lookup.index_id) {
            return Err(TableError::IndexNotFound {
                table: self.name.clone(),
                index: lookup.index_id.clone(),
            });
        }
        let mut table = self.clone();
        table.lookup = Some(lookup.clone());
        Ok(TableHandle::new(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn table_a() -> MemoryTable {
        MemoryTable::new(
            "a",
            vec![
                Column::new("xa", "", DataType::Integer, false),
                Column::new("ya", "", DataType::Integer, true),
                Column::new("za", "", DataType::Integer, true),
            ],
        )
        .with_rows(vec![
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
            vec![Value::Integer(4), Value::Integer(5), Value::Integer(6)],
        ])
        .with_index("a_pk", &["xa"], true)
    }

    #[test]
    fn test_projection_narrows_schema_and_rows() {
        let table = table_a();
        let projected = table
            .with_projection(&["za".to_string(), "xa".to_string()])
            .unwrap();

        let names: Vec<_> = projected.schema().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["xa", "za"]);
        assert_eq!(
            projected.scan().unwrap()[0],
            vec![Value::Integer(1), Value::Integer(3)]
        );
    }

    #[test]
    fn test_filters_are_evaluated_before_projection() {
        let table = table_a();
        let filtered = table
            .with_filters(vec![Expression::column("a", "ya", 1).equals(Expression::literal(5))])
            .unwrap();
        let projected = filtered
            .as_projected()
            .unwrap()
            .with_projection(&["xa".to_string()])
            .unwrap();
        assert_eq!(projected.scan().unwrap(), vec![vec![Value::Integer(4)]]);
    }

    #[test]
    fn test_equality_only_support_reports_subset() {
        let table = table_a().with_filter_support(FilterSupport::EqualityOnly);
        let eq = Expression::column("a", "xa", 0).equals(Expression::literal(1));
        let gt = Expression::binary(
            Expression::column("a", "ya", 1),
            Operator::GreaterThan,
            Expression::literal(0),
        );
        assert_eq!(table.handled_filters(&[eq.clone(), gt]), vec![eq]);
    }

    #[test]
    fn test_foreign_columns_are_never_handled() {
        let table = table_a();
        let foreign = Expression::column("b", "xb", 0).equals(Expression::literal(1));
        assert!(table.handled_filters(&[foreign]).is_empty());
    }

    #[test]
    fn test_index_lookup_selects_rows() {
        let table = table_a();
        let looked_up = table
            .with_index_lookup(&IndexLookup::point("a_pk", vec![Value::Integer(4)]))
            .unwrap();
        assert_eq!(looked_up.scan().unwrap().len(), 1);
        assert!(table
            .with_index_lookup(&IndexLookup::point("missing", vec![]))
            .is_err());
    }

    #[test]
    fn test_short_row_is_an_evaluation_error() {
        let table = table_a();
        table.insert(vec![Value::Integer(7)]);

        let projected = table.with_projection(&["za".to_string()]).unwrap();
        let err = projected.scan().unwrap_err();
        assert!(matches!(err, TableError::Evaluation(_)));

        let looked_up = MemoryTable::new("s", vec![Column::new("k", "", DataType::Integer, false)])
            .with_rows(vec![vec![]])
            .with_index("s_k", &["k"], true)
            .with_index_lookup(&IndexLookup::point("s_k", vec![Value::Integer(1)]))
            .unwrap();
        assert!(matches!(looked_up.scan(), Err(TableError::Evaluation(_))));
    }

    #[test]
    fn test_unknown_projection_column_is_rejected() {
        let err = table_a().with_projection(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, TableError::ColumnNotFound { .. }));
    }
}
