//! Script execution.
//!
//! Queries run row-at-a-time over [`Relation`]s built from the tables bound
//! in a [`Scope`]. Joins are nested loops, grouping is hash based and keeps
//! groups in order of first appearance, and every intermediate result is
//! checked against [`ScriptLimits::max_rows`].

mod aggregate;
mod engine;
mod evaluator;
mod functions;
mod relation;
mod scope;

pub use aggregate::{Accumulator, AggregateFunc};
pub use engine::{ScriptEngine, ScriptLimits};
pub use scope::Scope;

pub(crate) use relation::Relation;

use tabula_common::Table;

use crate::error::ScriptResult;
use crate::parser::Expr;

/// Returns the rows of `table` for which `predicate` is true.
///
/// Column references are resolved against `table`'s column names; NULL
/// predicate results drop the row.
pub fn filter_table(table: &Table, predicate: &Expr) -> ScriptResult<Table> {
    let rel = Relation::from_table(table, None);
    let mut keep = Vec::new();
    for (i, row) in rel.rows.iter().enumerate() {
        if evaluator::predicate(predicate, &evaluator::RowRef::new(&rel.columns, row))? {
            keep.push(i);
        }
    }
    Ok(table.take(&keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use crate::parser::Parser;
    use tabula_common::{Column, Value};

    fn table() -> Table {
        Table::new(vec![
            Column::from_values("city", vec![Value::text("London"), Value::text("Paris"), Value::Null]),
            Column::from_values("n", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_filter_table() {
        let expr = Parser::parse_expr("city = 'London' OR n > 2").unwrap();
        let out = filter_table(&table(), &expr).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column("n").unwrap().values(), &[Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn test_filter_unknown_column() {
        let expr = Parser::parse_expr("zip = 1").unwrap();
        assert_eq!(
            filter_table(&table(), &expr),
            Err(ScriptError::UnknownColumn("zip".to_string()))
        );
    }
}
