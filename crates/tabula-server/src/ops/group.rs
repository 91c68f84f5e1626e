//! Grouped aggregation.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tabula_common::{Column, DataType, Table, TabulaError, TabulaResult, Value};
use tabula_script::{Accumulator, AggregateFunc, ScriptError};

/// One `(column, function)` pair of a group-by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Column to aggregate.
    pub column: String,
    /// Function name: `sum`, `mean`/`avg`, `count`, `min`, `max`, `first`,
    /// `last` or `nunique`.
    pub function: String,
}

impl Aggregation {
    /// Creates an aggregation.
    pub fn new(column: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            function: function.into(),
        }
    }

    fn resolve(&self) -> TabulaResult<(AggregateFunc, bool)> {
        let name = self.function.to_ascii_lowercase();
        if name == "nunique" {
            return Ok((AggregateFunc::Count, true));
        }
        AggregateFunc::from_name(&name, false)
            .map(|func| (func, false))
            .ok_or_else(|| {
                TabulaError::invalid_argument(format!(
                    "unknown aggregation function '{}'",
                    self.function
                ))
            })
    }
}

/// Groups rows by `group_columns` and aggregates each group.
///
/// Output has the group columns followed by one column per aggregation,
/// named after the aggregated column (`{column}_{function}` on a clash).
/// Groups come out sorted by key; rows with a NULL key are dropped.
pub fn group_by<S: AsRef<str>>(
    table: &Table,
    group_columns: &[S],
    aggregations: &[Aggregation],
) -> TabulaResult<Table> {
    if group_columns.is_empty() {
        return Err(TabulaError::invalid_argument("no group columns given"));
    }

    let mut wanted: Vec<&str> = group_columns.iter().map(AsRef::as_ref).collect();
    wanted.extend(aggregations.iter().map(|a| a.column.as_str()));
    table.check_columns(&wanted)?;

    let funcs = aggregations
        .iter()
        .map(Aggregation::resolve)
        .collect::<TabulaResult<Vec<_>>>()?;

    let keys: Vec<&Column> = group_columns
        .iter()
        .map(|name| table.require_column(name.as_ref()))
        .collect::<TabulaResult<_>>()?;

    let mut groups: BTreeMap<Vec<Value>, Vec<usize>> = BTreeMap::new();
    for row in 0..table.num_rows() {
        let key: Vec<Value> = keys.iter().map(|c| c.get(row).clone()).collect();
        if key.iter().any(Value::is_null) {
            continue;
        }
        groups.entry(key).or_default().push(row);
    }

    let mut names: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(keys.len() + aggregations.len());

    for (i, key_col) in keys.iter().enumerate() {
        let values = groups.keys().map(|k| k[i].clone()).collect();
        names.insert(key_col.name().to_string());
        columns.push(Column::from_values_with_hint(
            key_col.name(),
            key_col.data_type(),
            values,
        ));
    }

    for (agg, (func, distinct)) in aggregations.iter().zip(funcs) {
        let source = table.require_column(&agg.column)?;
        let mut values = Vec::with_capacity(groups.len());
        for rows in groups.values() {
            let mut acc = Accumulator::new(func, distinct);
            for &row in rows {
                acc.update(source.get(row))
                    .map_err(ScriptError::into_operation_error)?;
            }
            values.push(acc.finish());
        }

        let name = output_name(&mut names, agg);
        let hint = match func {
            AggregateFunc::Count | AggregateFunc::CountAll => DataType::Integer,
            AggregateFunc::Avg => DataType::Float,
            _ => source.data_type(),
        };
        columns.push(Column::from_values_with_hint(name, hint, values));
    }

    Table::new(columns)
}

/// Names an aggregation's output column: the source column, then
/// `{column}_{function}`, then `{column}_{function}_1`, `_2`, ...
fn output_name(taken: &mut HashSet<String>, agg: &Aggregation) -> String {
    let base = format!("{}_{}", agg.column, agg.function.to_ascii_lowercase());
    let name = std::iter::once(agg.column.clone())
        .chain(std::iter::once(base.clone()))
        .chain((1..).map(|i| format!("{}_{}", base, i)))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.clone());
    taken.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_common::Field;

    fn orders() -> Table {
        Table::from_rows(
            &[
                Field::new("user_id", DataType::Integer),
                Field::new("product", DataType::Text),
                Field::new("amount", DataType::Float),
            ],
            vec![
                vec![Value::Int(2), Value::text("Keyboard"), Value::Float(75.0)],
                vec![Value::Int(1), Value::text("Laptop"), Value::Float(1200.0)],
                vec![Value::Int(1), Value::text("Mouse"), Value::Float(25.0)],
                vec![Value::Null, Value::text("Cable"), Value::Float(5.0)],
                vec![Value::Int(2), Value::text("Desk"), Value::Float(250.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sum_and_count() {
        let out = group_by(
            &orders(),
            &["user_id"],
            &[Aggregation::new("amount", "sum"), Aggregation::new("product", "count")],
        )
        .unwrap();

        assert_eq!(out.column_names(), vec!["user_id", "amount", "product"]);
        assert_eq!(out.column("user_id").unwrap().values(), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(
            out.column("amount").unwrap().values(),
            &[Value::Float(1225.0), Value::Float(325.0)]
        );
        assert_eq!(out.column("product").unwrap().values(), &[Value::Int(2), Value::Int(2)]);
    }

    #[test]
    fn test_name_clash_and_mean() {
        let out = group_by(
            &orders(),
            &["user_id"],
            &[
                Aggregation::new("amount", "max"),
                Aggregation::new("amount", "mean"),
                Aggregation::new("product", "nunique"),
            ],
        )
        .unwrap();
        assert_eq!(out.column_names(), vec!["user_id", "amount", "amount_mean", "product"]);
        assert_eq!(out.column("amount").unwrap().get(0), &Value::Float(1200.0));
        assert_eq!(out.column("amount_mean").unwrap().get(1), &Value::Float(162.5));
    }

    #[test]
    fn test_repeated_aggregation_names() {
        let sum = Aggregation::new("amount", "sum");
        let out = group_by(&orders(), &["user_id"], &[sum.clone(), sum.clone(), sum]).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["user_id", "amount", "amount_sum", "amount_sum_1"]
        );
        assert_eq!(out.column("amount_sum_1").unwrap().get(0), &Value::Float(1225.0));
    }

    #[test]
    fn test_errors() {
        let t = orders();
        assert_eq!(
            group_by(&t, &["zip"], &[Aggregation::new("amount", "sum")]).unwrap_err(),
            TabulaError::column_not_found("zip")
        );
        assert!(group_by(&t, &["user_id"], &[Aggregation::new("amount", "median")])
            .unwrap_err()
            .is_argument_error());
        let none: [&str; 0] = [];
        assert!(group_by(&t, &none, &[]).unwrap_err().is_argument_error());
        assert!(group_by(&t, &["user_id"], &[Aggregation::new("product", "sum")])
            .unwrap_err()
            .is_argument_error());
    }
}
