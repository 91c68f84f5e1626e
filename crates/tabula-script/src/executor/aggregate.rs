//! Aggregate functions.

use std::collections::HashSet;
use std::fmt;

use tabula_common::Value;

use super::evaluator::{compare_values, type_name};
use crate::error::{ScriptError, ScriptResult};

/// An aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    /// `COUNT(*)`: every row.
    CountAll,
    /// `COUNT(x)`: non-null values.
    Count,
    /// Sum of non-null values.
    Sum,
    /// Mean of non-null values.
    Avg,
    /// Smallest non-null value.
    Min,
    /// Largest non-null value.
    Max,
    /// First non-null value in row order.
    First,
    /// Last non-null value in row order.
    Last,
}

impl AggregateFunc {
    /// Looks up an aggregate by lowercase function name. `star` is true
    /// for a `(*)` argument list.
    pub fn from_name(name: &str, star: bool) -> Option<Self> {
        match (name, star) {
            ("count", true) => Some(AggregateFunc::CountAll),
            ("count", false) => Some(AggregateFunc::Count),
            ("sum", false) => Some(AggregateFunc::Sum),
            ("avg" | "mean", false) => Some(AggregateFunc::Avg),
            ("min", false) => Some(AggregateFunc::Min),
            ("max", false) => Some(AggregateFunc::Max),
            ("first", false) => Some(AggregateFunc::First),
            ("last", false) => Some(AggregateFunc::Last),
            _ => None,
        }
    }

    /// Returns the function name.
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunc::CountAll | AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
            AggregateFunc::First => "first",
            AggregateFunc::Last => "last",
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running state of one aggregate over one group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    func: AggregateFunc,
    seen: Option<HashSet<Value>>,
    count: i64,
    float_sum: f64,
    value: Option<Value>,
}

impl Accumulator {
    /// Creates an accumulator. With `distinct`, repeated values are
    /// only counted once.
    pub fn new(func: AggregateFunc, distinct: bool) -> Self {
        Self {
            func,
            seen: distinct.then(HashSet::new),
            count: 0,
            float_sum: 0.0,
            value: None,
        }
    }

    /// Feeds one value.
    pub fn update(&mut self, value: &Value) -> ScriptResult<()> {
        if self.func == AggregateFunc::CountAll {
            self.count += 1;
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
        }

        match self.func {
            AggregateFunc::CountAll | AggregateFunc::Count => self.count += 1,
            AggregateFunc::Sum => {
                self.require_numeric(value)?;
                self.value = Some(match (self.value.take(), value) {
                    (None, v) => v.clone(),
                    (Some(Value::Int(a)), Value::Int(b)) => a
                        .checked_add(*b)
                        .map_or(Value::Float(a as f64 + *b as f64), Value::Int),
                    (Some(acc), v) => Value::Float(
                        acc.to_f64().unwrap_or(0.0) + v.to_f64().unwrap_or(0.0),
                    ),
                });
            }
            AggregateFunc::Avg => {
                self.require_numeric(value)?;
                self.float_sum += value.to_f64().unwrap_or(0.0);
                self.count += 1;
            }
            AggregateFunc::Min | AggregateFunc::Max => {
                let replace = match &self.value {
                    None => true,
                    Some(current) => {
                        let ord = compare_values(value, current)?;
                        if self.func == AggregateFunc::Min {
                            ord.is_lt()
                        } else {
                            ord.is_gt()
                        }
                    }
                };
                if replace {
                    self.value = Some(value.clone());
                }
            }
            AggregateFunc::First => {
                if self.value.is_none() {
                    self.value = Some(value.clone());
                }
            }
            AggregateFunc::Last => self.value = Some(value.clone()),
        }
        Ok(())
    }

    /// Returns the aggregate's result. Empty input yields 0 for counts
    /// and NULL otherwise.
    pub fn finish(&self) -> Value {
        match self.func {
            AggregateFunc::CountAll | AggregateFunc::Count => Value::Int(self.count),
            AggregateFunc::Avg if self.count == 0 => Value::Null,
            AggregateFunc::Avg => Value::Float(self.float_sum / self.count as f64),
            _ => self.value.clone().unwrap_or(Value::Null),
        }
    }

    fn require_numeric(&self, value: &Value) -> ScriptResult<()> {
        if value.is_numeric() {
            Ok(())
        } else {
            Err(ScriptError::TypeMismatch(format!(
                "{}() needs numbers, got {}",
                self.func,
                type_name(value)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: AggregateFunc, distinct: bool, values: &[Value]) -> ScriptResult<Value> {
        let mut acc = Accumulator::new(func, distinct);
        for v in values {
            acc.update(v)?;
        }
        Ok(acc.finish())
    }

    #[test]
    fn test_counts() {
        let values = [Value::Int(1), Value::Null, Value::Int(1), Value::Int(2)];
        assert_eq!(run(AggregateFunc::CountAll, false, &values).unwrap(), Value::Int(4));
        assert_eq!(run(AggregateFunc::Count, false, &values).unwrap(), Value::Int(3));
        assert_eq!(run(AggregateFunc::Count, true, &values).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_sum_and_avg() {
        let ints = [Value::Int(1), Value::Int(2), Value::Null];
        assert_eq!(run(AggregateFunc::Sum, false, &ints).unwrap(), Value::Int(3));
        assert_eq!(run(AggregateFunc::Avg, false, &ints).unwrap(), Value::Float(1.5));

        let mixed = [Value::Int(1), Value::Float(0.5)];
        assert_eq!(run(AggregateFunc::Sum, false, &mixed).unwrap(), Value::Float(1.5));

        assert_eq!(run(AggregateFunc::Sum, false, &[]).unwrap(), Value::Null);
        assert!(run(AggregateFunc::Sum, false, &[Value::text("x")]).is_err());
    }

    #[test]
    fn test_min_max_first_last() {
        let values = [Value::text("b"), Value::Null, Value::text("a"), Value::text("c")];
        assert_eq!(run(AggregateFunc::Min, false, &values).unwrap(), Value::text("a"));
        assert_eq!(run(AggregateFunc::Max, false, &values).unwrap(), Value::text("c"));
        assert_eq!(run(AggregateFunc::First, false, &values).unwrap(), Value::text("b"));
        assert_eq!(run(AggregateFunc::Last, false, &values).unwrap(), Value::text("c"));
    }

    #[test]
    fn test_lookup() {
        assert_eq!(AggregateFunc::from_name("count", true), Some(AggregateFunc::CountAll));
        assert_eq!(AggregateFunc::from_name("mean", false), Some(AggregateFunc::Avg));
        assert_eq!(AggregateFunc::from_name("sum", true), None);
        assert_eq!(AggregateFunc::from_name("upper", false), None);
    }
}
