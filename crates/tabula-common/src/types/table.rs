//! The in-memory table every operation reads or produces.

use std::collections::HashSet;

use super::{Column, Field, Value};
use crate::error::{TabulaError, TabulaResult};

/// An ordered set of named, typed columns sharing one row count.
///
/// Column names are unique within a table. Tables are plain values: cloning
/// one produces an independent copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// Creates a table from columns.
    ///
    /// Fails if column lengths differ or a column name repeats.
    pub fn new(columns: Vec<Column>) -> TabulaResult<Self> {
        let num_rows = columns.first().map_or(0, Column::len);

        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.name()) {
                return Err(TabulaError::column_exists(col.name()));
            }
            if col.len() != num_rows {
                return Err(TabulaError::invalid_argument(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name(),
                    col.len(),
                    num_rows
                )));
            }
        }

        Ok(Self { columns, num_rows })
    }

    /// Creates an empty table with the given fields.
    pub fn empty(fields: &[Field]) -> TabulaResult<Self> {
        Self::new(
            fields
                .iter()
                .map(|f| Column::empty(f.name.clone(), f.data_type))
                .collect(),
        )
    }

    /// Creates a table from row-major data.
    pub fn from_rows(fields: &[Field], rows: Vec<Vec<Value>>) -> TabulaResult<Self> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); fields.len()];

        for row in rows {
            if row.len() != fields.len() {
                return Err(TabulaError::invalid_argument(format!(
                    "row has {} values, expected {}",
                    row.len(),
                    fields.len()
                )));
            }
            for (i, value) in row.into_iter().enumerate() {
                columns[i].push(value);
            }
        }

        let columns = columns
            .into_iter()
            .zip(fields)
            .map(|(values, field)| Column::new(field.name.clone(), field.data_type, values))
            .collect::<TabulaResult<Vec<_>>>()?;

        Self::new(columns)
    }

    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.columns.len())
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Returns the columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Consumes the table, returning its columns.
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Returns the fields in order.
    pub fn fields(&self) -> Vec<Field> {
        self.columns.iter().map(Column::field).collect()
    }

    /// Returns the index of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Returns true if the named column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns the named column.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Returns the named column, or `ColumnNotFound`.
    pub fn require_column(&self, name: &str) -> TabulaResult<&Column> {
        self.column(name)
            .ok_or_else(|| TabulaError::column_not_found(name))
    }

    /// Returns mutable access to the named column.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// Fails with `ColumnNotFound` listing every name that is absent.
    pub fn check_columns<S: AsRef<str>>(&self, names: &[S]) -> TabulaResult<()> {
        let missing: Vec<String> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| !self.has_column(n))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TabulaError::ColumnNotFound { columns: missing })
        }
    }

    /// Returns the row at `index`.
    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        if index >= self.num_rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c.get(index).clone()).collect())
    }

    /// Returns an iterator over the rows.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.num_rows).map(move |i| self.columns.iter().map(|c| c.get(i).clone()).collect())
    }

    /// Appends a column.
    ///
    /// Fails with `ColumnExists` on a name clash. A table without columns
    /// takes its row count from the first column added.
    pub fn add_column(&mut self, column: Column) -> TabulaResult<()> {
        if self.has_column(column.name()) {
            return Err(TabulaError::column_exists(column.name()));
        }
        if self.columns.is_empty() {
            self.num_rows = column.len();
        } else if column.len() != self.num_rows {
            return Err(TabulaError::invalid_argument(format!(
                "column '{}' has {} rows, expected {}",
                column.name(),
                column.len(),
                self.num_rows
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Appends a row, widening column types where needed.
    pub fn push_row(&mut self, row: Vec<Value>) -> TabulaResult<()> {
        if row.len() != self.columns.len() {
            return Err(TabulaError::invalid_argument(format!(
                "row has {} values, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        for (col, value) in self.columns.iter_mut().zip(row) {
            col.push(value);
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Returns a new table holding the rows at `indices`, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            num_rows: indices.len(),
        }
    }

    /// Returns up to `len` rows starting at `offset`.
    #[must_use]
    pub fn slice(&self, offset: usize, len: usize) -> Table {
        let start = offset.min(self.num_rows);
        let end = start.saturating_add(len).min(self.num_rows);
        let indices: Vec<usize> = (start..end).collect();
        self.take(&indices)
    }

    /// Returns the first `n` rows.
    #[must_use]
    pub fn head(&self, n: usize) -> Table {
        self.slice(0, n)
    }

    /// Returns the last `n` rows.
    #[must_use]
    pub fn tail(&self, n: usize) -> Table {
        self.slice(self.num_rows.saturating_sub(n), n)
    }

    /// Returns the named columns, in the requested order.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> TabulaResult<Table> {
        self.check_columns(names)?;
        let columns = names
            .iter()
            .filter_map(|n| self.column(n.as_ref()).cloned())
            .collect();
        Table::new(columns)
    }

    /// Returns the table without the named columns; absent names are ignored.
    #[must_use]
    pub fn without_columns<S: AsRef<str>>(&self, names: &[S]) -> Table {
        let drop: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| !drop.contains(c.name()))
            .cloned()
            .collect();
        let num_rows = if columns.is_empty() { 0 } else { self.num_rows };
        Table { columns, num_rows }
    }

    /// Returns the table with duplicate rows removed, keeping first
    /// occurrences in their original order.
    #[must_use]
    pub fn distinct(&self) -> Table {
        let mut seen = HashSet::with_capacity(self.num_rows);
        let keep: Vec<usize> = self
            .rows()
            .enumerate()
            .filter(|(_, row)| seen.insert(row.clone()))
            .map(|(i, _)| i)
            .collect();
        self.take(&keep)
    }
}
