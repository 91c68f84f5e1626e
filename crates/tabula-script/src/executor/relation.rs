//! Row-major intermediate results.

use std::collections::HashSet;

use tabula_common::{Column, DataType, Table, Value};

use crate::error::{ScriptError, ScriptResult};
use crate::parser::ColumnRef;

/// Output column of a relation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnMeta {
    /// Table name or alias the column can be qualified with.
    pub qualifier: Option<String>,
    pub name: String,
    /// Declared type carried over from a source table.
    pub data_type: Option<DataType>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
            data_type: None,
        }
    }

    fn matches(&self, col: &ColumnRef) -> bool {
        self.name == col.column
            && col
                .table
                .as_deref()
                .map_or(true, |t| self.qualifier.as_deref() == Some(t))
    }
}

/// Resolves a column reference against `columns`.
///
/// Returns `Ok(None)` when nothing matches and an error when the reference
/// is ambiguous.
pub(crate) fn try_resolve(columns: &[ColumnMeta], col: &ColumnRef) -> ScriptResult<Option<usize>> {
    let mut found = None;
    for (i, meta) in columns.iter().enumerate() {
        if meta.matches(col) {
            if found.is_some() {
                return Err(ScriptError::AmbiguousColumn(col.to_string()));
            }
            found = Some(i);
        }
    }
    Ok(found)
}

/// Resolves a column reference, failing with `UnknownColumn`.
pub(crate) fn resolve(columns: &[ColumnMeta], col: &ColumnRef) -> ScriptResult<usize> {
    try_resolve(columns, col)?.ok_or_else(|| ScriptError::UnknownColumn(col.to_string()))
}

/// A row-major table used while a query runs.
#[derive(Debug, Clone, Default)]
pub(crate) struct Relation {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Value>>,
}

impl Relation {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// A relation with no columns and exactly one row, the input of a
    /// SELECT without FROM.
    pub fn unit() -> Self {
        Self {
            columns: Vec::new(),
            rows: vec![Vec::new()],
        }
    }

    pub fn from_table(table: &Table, qualifier: Option<&str>) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|c| ColumnMeta {
                qualifier: qualifier.map(str::to_string),
                name: c.name().to_string(),
                data_type: Some(c.data_type()),
            })
            .collect();
        Self {
            columns,
            rows: table.rows().collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Replaces every column's qualifier.
    pub fn requalify(&mut self, qualifier: Option<&str>) {
        for meta in &mut self.columns {
            meta.qualifier = qualifier.map(str::to_string);
        }
    }

    /// Removes duplicate rows, keeping first occurrences.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Converts into a column-major table.
    ///
    /// Repeated names get `_1`, `_2`, ... suffixes. Declared types are
    /// kept unless the values need a wider one.
    pub fn into_table(self) -> ScriptResult<Table> {
        let names = unique_names(self.columns.iter().map(|m| m.name.as_str()));

        let mut values: Vec<Vec<Value>> =
            vec![Vec::with_capacity(self.rows.len()); self.columns.len()];
        for row in self.rows {
            for (i, value) in row.into_iter().enumerate() {
                values[i].push(value);
            }
        }

        let columns = values
            .into_iter()
            .zip(self.columns)
            .zip(names)
            .map(|((values, meta), name)| match meta.data_type {
                Some(hint) => Column::from_values_with_hint(name, hint, values),
                None => Column::from_values(name, values),
            })
            .collect();

        Ok(Table::new(columns)?)
    }
}

fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        let mut candidate = name.to_string();
        let mut n = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(qualifier: &str, name: &str) -> ColumnMeta {
        ColumnMeta {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
            data_type: None,
        }
    }

    #[test]
    fn test_resolve() {
        let cols = vec![meta("u", "user_id"), meta("o", "user_id"), meta("o", "amount")];

        assert_eq!(resolve(&cols, &ColumnRef::new("amount")).unwrap(), 2);
        assert_eq!(resolve(&cols, &ColumnRef::qualified("o", "user_id")).unwrap(), 1);
        assert!(matches!(
            resolve(&cols, &ColumnRef::new("user_id")),
            Err(ScriptError::AmbiguousColumn(_))
        ));
        assert!(matches!(
            resolve(&cols, &ColumnRef::new("missing")),
            Err(ScriptError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_into_table_dedupes_names() {
        let rel = Relation::new(
            vec![ColumnMeta::new("x"), ColumnMeta::new("x"), ColumnMeta::new("x_1")],
            vec![vec![Value::Int(1), Value::Int(2), Value::Int(3)]],
        );
        let table = rel.into_table().unwrap();
        assert_eq!(table.column_names(), vec!["x", "x_1", "x_1_1"]);
    }

    #[test]
    fn test_into_table_keeps_declared_type() {
        let mut m = ColumnMeta::new("amount");
        m.data_type = Some(DataType::Float);
        let rel = Relation::new(vec![m], vec![vec![Value::Int(3)], vec![Value::Null]]);
        let table = rel.into_table().unwrap();
        let col = table.column("amount").unwrap();
        assert_eq!(col.data_type(), DataType::Float);
        assert_eq!(col.get(0), &Value::Float(3.0));
    }
}
