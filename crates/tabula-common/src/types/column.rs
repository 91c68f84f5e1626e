//! Typed columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::error::{TabulaError, TabulaResult};

/// The scalar type shared by every cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit signed integers.
    Integer,
    /// 64-bit floats.
    Float,
    /// UTF-8 text.
    Text,
    /// Booleans.
    Boolean,
}

impl DataType {
    /// Returns the narrowest type both `self` and `other` widen into.
    ///
    /// Integers and floats meet at float; every other mix meets at text.
    #[must_use]
    pub fn unify(self, other: DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            _ => DataType::Text,
        }
    }

    /// Returns true for integer and float.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Returns the dtype name shown by schema reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataType::Integer => "int64",
            DataType::Float => "float64",
            DataType::Text => "text",
            DataType::Boolean => "bool",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = TabulaError;

    /// Parses SQL-style and dtype-style type names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let base = s
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match base.as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "INT2" | "INT4" | "INT8"
            | "INT64" => Ok(DataType::Integer),
            "FLOAT" | "FLOAT4" | "FLOAT8" | "FLOAT64" | "DOUBLE" | "REAL" | "DECIMAL"
            | "NUMERIC" => Ok(DataType::Float),
            "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" | "STRING" | "NVARCHAR" => {
                Ok(DataType::Text)
            }
            "BOOL" | "BOOLEAN" => Ok(DataType::Boolean),
            _ => Err(TabulaError::invalid_argument(format!(
                "unsupported column type '{}'",
                s
            ))),
        }
    }
}

/// A column's name and type, without data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: DataType,
}

impl Field {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

static NULL: Value = Value::Null;

/// A named, typed column of values.
///
/// Every non-null value matches `data_type`. Writing a value of another
/// type widens the whole column (see [`DataType::unify`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    values: Vec<Value>,
}

impl Column {
    /// Creates a column, coercing values into `data_type`.
    ///
    /// Fails if a value cannot be represented in `data_type` without loss.
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        values: Vec<Value>,
    ) -> TabulaResult<Self> {
        let name = name.into();
        let values = values
            .into_iter()
            .map(|v| {
                v.coerce_to(data_type).ok_or_else(|| {
                    TabulaError::invalid_argument(format!(
                        "value {} does not fit column '{}' of type {}",
                        v, name, data_type
                    ))
                })
            })
            .collect::<TabulaResult<Vec<_>>>()?;

        Ok(Self {
            name,
            data_type,
            values,
        })
    }

    /// Creates an empty column.
    pub fn empty(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            values: Vec::new(),
        }
    }

    /// Creates a column whose type is inferred from its values.
    ///
    /// A column of only NULLs is typed as text.
    pub fn from_values(name: impl Into<String>, values: Vec<Value>) -> Self {
        let data_type = infer_type(&values).unwrap_or(DataType::Text);
        Self::from_values_with_hint(name, data_type, values)
    }

    /// Creates a column typed as `hint` unless a value requires widening.
    pub fn from_values_with_hint(
        name: impl Into<String>,
        hint: DataType,
        values: Vec<Value>,
    ) -> Self {
        let data_type = infer_type(&values).map_or(hint, |t| {
            if t == hint || (t == DataType::Integer && hint == DataType::Float) {
                hint
            } else {
                t.unify(hint)
            }
        });
        let values = values
            .into_iter()
            .map(|v| v.coerce_to(data_type).unwrap_or(Value::Null))
            .collect();

        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the column.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the column with a new name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.rename(name);
        self
    }

    /// Returns the column type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the field describing this column.
    pub fn field(&self) -> Field {
        Field::new(self.name.clone(), self.data_type)
    }

    /// Returns the values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the column, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the column has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `index`, or NULL past the end.
    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    /// Appends a value, widening the column type if needed.
    pub fn push(&mut self, value: Value) {
        let value = self.admit(value);
        self.values.push(value);
    }

    /// Overwrites the value at `index`, widening the column type if needed.
    ///
    /// Indices past the end are ignored.
    pub fn set(&mut self, index: usize, value: Value) {
        if index >= self.values.len() {
            return;
        }
        let value = self.admit(value);
        self.values[index] = value;
    }

    /// Returns a new column holding the values at `indices`, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            data_type: self.data_type,
            values: indices.iter().map(|&i| self.get(i).clone()).collect(),
        }
    }

    /// Coerces `value` into this column, widening the column first if the
    /// value does not fit.
    fn admit(&mut self, value: Value) -> Value {
        if let Some(v) = value.coerce_to(self.data_type) {
            return v;
        }
        let target = value
            .data_type()
            .map_or(self.data_type, |t| self.data_type.unify(t));
        self.widen(target);
        value.coerce_to(target).unwrap_or(Value::Null)
    }

    fn widen(&mut self, target: DataType) {
        if target == self.data_type {
            return;
        }
        for v in &mut self.values {
            *v = v.coerce_to(target).unwrap_or(Value::Null);
        }
        self.data_type = target;
    }
}

/// Infers the unified type of a set of values, ignoring NULLs.
pub(crate) fn infer_type(values: &[Value]) -> Option<DataType> {
    values
        .iter()
        .filter_map(Value::data_type)
        .reduce(DataType::unify)
}
