//! Row-level operations.

use tabula_common::{Table, TabulaError, TabulaResult};
use tabula_script::{filter_table, Parser, ScriptError};

/// Returns `(rows, columns)`.
pub fn shape(table: &Table) -> (usize, usize) {
    table.shape()
}

/// Returns the first `rows` rows.
pub fn head(table: &Table, rows: usize) -> Table {
    table.head(rows)
}

/// Returns the first `n` rows, at most `max_rows`.
pub fn top_n(table: &Table, n: i64, max_rows: usize) -> TabulaResult<Table> {
    if n <= 0 {
        return Err(TabulaError::invalid_argument(format!(
            "n must be a positive integer, got {}",
            n
        )));
    }
    let n = usize::try_from(n).unwrap_or(usize::MAX).min(max_rows);
    Ok(table.head(n))
}

/// Keeps the rows for which the SQL `expression` is true.
pub fn filter_rows(table: &Table, expression: &str) -> TabulaResult<Table> {
    let predicate = Parser::parse_expr(expression).map_err(ScriptError::into_operation_error)?;
    filter_table(table, &predicate).map_err(ScriptError::into_operation_error)
}

/// Removes duplicate rows, keeping first occurrences.
pub fn remove_duplicates(table: &Table) -> Table {
    table.distinct()
}

/// Returns the distinct rows of `columns`, or of the whole table when no
/// columns are given.
pub fn distinct_rows<S: AsRef<str>>(table: &Table, columns: Option<&[S]>) -> TabulaResult<Table> {
    match columns {
        Some(columns) if !columns.is_empty() => Ok(table.project(columns)?.distinct()),
        _ => Ok(table.distinct()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_common::{Column, Value};

    fn table() -> Table {
        Table::new(vec![
            Column::from_values(
                "city",
                vec![
                    Value::text("London"),
                    Value::text("Paris"),
                    Value::text("London"),
                    Value::text("London"),
                ],
            ),
            Column::from_values(
                "amount",
                vec![Value::Float(75.0), Value::Float(300.0), Value::Float(250.0), Value::Float(75.0)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_top_n() {
        let t = table();
        assert_eq!(top_n(&t, 2, 1000).unwrap().num_rows(), 2);
        assert_eq!(top_n(&t, 1000, 1000).unwrap().num_rows(), 4);
        assert_eq!(top_n(&t, 3, 1).unwrap().num_rows(), 1);
        assert!(top_n(&t, 0, 1000).unwrap_err().is_argument_error());
        assert!(top_n(&t, -3, 1000).is_err());
    }

    #[test]
    fn test_filter_rows() {
        let t = filter_rows(&table(), "amount > 100 AND city = 'London'").unwrap();
        assert_eq!(t.num_rows(), 1);
        assert_eq!(t.column("amount").unwrap().get(0), &Value::Float(250.0));
    }

    #[test]
    fn test_filter_rows_errors() {
        assert_eq!(
            filter_rows(&table(), "zip = 1").unwrap_err(),
            TabulaError::column_not_found("zip")
        );
        assert!(filter_rows(&table(), "amount >").unwrap_err().is_argument_error());
        assert!(filter_rows(&table(), "").unwrap_err().is_argument_error());
    }

    #[test]
    fn test_filter_rows_rejects_trailing_input() {
        for expr in [
            "amount > 100 garbage",
            "amount > 100 AND_THIS city = 'Paris'",
        ] {
            assert!(filter_rows(&table(), expr).unwrap_err().is_argument_error(), "{}", expr);
        }
    }

    #[test]
    fn test_filter_rows_rejects_deep_expression() {
        let expr = format!("{}amount > 0", "amount + ".repeat(5000));
        assert!(filter_rows(&table(), &expr).unwrap_err().is_argument_error());
    }

    #[test]
    fn test_duplicates() {
        let t = table();
        assert_eq!(remove_duplicates(&t).num_rows(), 3);
        assert_eq!(distinct_rows::<&str>(&t, None).unwrap().num_rows(), 3);

        let cities = distinct_rows(&t, Some(&["city"][..])).unwrap();
        assert_eq!(cities.shape(), (2, 1));

        assert!(distinct_rows(&t, Some(&["zip"][..])).is_err());
    }

    #[test]
    fn test_shape_and_head() {
        assert_eq!(shape(&table()), (4, 2));
        assert_eq!(head(&table(), 5).num_rows(), 4);
    }
}
