//! Column-level operations.

use tabula_common::{Column, DataType, Table, TabulaError, TabulaResult, Value};

/// Appends `new_col` holding `col1 + sep + col2` rendered as text.
///
/// NULL cells render as `NULL`. Fails with `ColumnNotFound` if a source
/// column is missing and with `ColumnExists` if `new_col` is taken; the
/// table is untouched on failure.
pub fn combine_columns(
    table: &mut Table,
    col1: &str,
    col2: &str,
    new_col: &str,
    sep: &str,
) -> TabulaResult<()> {
    table.check_columns(&[col1, col2])?;
    if table.has_column(new_col) {
        return Err(TabulaError::column_exists(new_col));
    }

    let left = table.require_column(col1)?;
    let right = table.require_column(col2)?;
    let values = left
        .values()
        .iter()
        .zip(right.values())
        .map(|(a, b)| Value::Text(format!("{}{}{}", a, sep, b)))
        .collect();

    table.add_column(Column::new(new_col, DataType::Text, values)?)
}

/// Returns the named columns in the requested order.
pub fn select_columns<S: AsRef<str>>(table: &Table, columns: &[S]) -> TabulaResult<Table> {
    if columns.is_empty() {
        return Err(TabulaError::invalid_argument("no columns to select"));
    }
    table.project(columns)
}

/// Returns the table without the named columns; absent names are ignored.
pub fn drop_columns<S: AsRef<str>>(table: &Table, columns: &[S]) -> Table {
    table.without_columns(columns)
}

/// Describes a table: one row per column with its name, dtype and the
/// table's row count.
pub fn get_schema(table: &Table) -> TabulaResult<Table> {
    let rows = table.num_rows() as i64;
    let (names, dtypes): (Vec<Value>, Vec<Value>) = table
        .columns()
        .iter()
        .map(|c| (Value::text(c.name()), Value::text(c.data_type().name())))
        .unzip();
    let counts = vec![Value::Int(rows); names.len()];

    Table::new(vec![
        Column::new("column", DataType::Text, names)?,
        Column::new("dtype", DataType::Text, dtypes)?,
        Column::new("num_rows", DataType::Integer, counts)?,
    ])
}
