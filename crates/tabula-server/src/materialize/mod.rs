//! Materialization.
//!
//! Turns a table into a text payload a client can read: a preview table,
//! JSON, or CSV. Materializing never changes the table.

use std::fmt;
use std::str::FromStr;

use comfy_table::{Cell, ContentArrangement, Table as TextTable};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value as JsonValue};
use tabula_common::{Column, Table, TabulaError, TabulaResult, Value};

/// Output format for [`materialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterializeFormat {
    /// First `n` rows as a text table.
    #[default]
    HeadString,
    /// Last `n` rows as a text table.
    TailString,
    /// `n` seeded random rows as a text table.
    SampleString,
    /// Every row as a text table, up to the row cap.
    FullString,
    /// JSON array of row objects.
    JsonRecords,
    /// JSON object with `columns`, `index` and `data`.
    JsonSplit,
    /// CSV with a header line.
    Csv,
}

impl MaterializeFormat {
    /// All formats, in documentation order.
    pub const ALL: [MaterializeFormat; 7] = [
        MaterializeFormat::HeadString,
        MaterializeFormat::TailString,
        MaterializeFormat::SampleString,
        MaterializeFormat::FullString,
        MaterializeFormat::JsonRecords,
        MaterializeFormat::JsonSplit,
        MaterializeFormat::Csv,
    ];

    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            MaterializeFormat::HeadString => "head_string",
            MaterializeFormat::TailString => "tail_string",
            MaterializeFormat::SampleString => "sample_string",
            MaterializeFormat::FullString => "full_string",
            MaterializeFormat::JsonRecords => "json_records",
            MaterializeFormat::JsonSplit => "json_split",
            MaterializeFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for MaterializeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterializeFormat {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| TabulaError::UnsupportedFormat {
                format: s.to_string(),
            })
    }
}

/// Knobs for [`materialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// Row count used when the caller's `n` is not positive.
    pub default_rows: usize,
    /// Cap for `full_string`.
    pub max_rows: usize,
    /// Seed for `sample_string`.
    pub sample_seed: u64,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            default_rows: tabula_common::DEFAULT_PREVIEW_ROWS,
            max_rows: tabula_common::DEFAULT_MAX_ROWS,
            sample_seed: tabula_common::DEFAULT_SAMPLE_SEED,
        }
    }
}

/// Renders `table` in `format`.
///
/// `n` applies to the head, tail and sample formats; values `<= 0` fall back
/// to `options.default_rows`.
pub fn materialize(
    table: &Table,
    format: MaterializeFormat,
    n: i64,
    options: &MaterializeOptions,
) -> TabulaResult<String> {
    let n = usize::try_from(n)
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(options.default_rows);
    let total = table.num_rows();

    let output = match format {
        MaterializeFormat::HeadString => {
            let rows: Vec<usize> = (0..n.min(total)).collect();
            render_rows(table, &rows)
        }
        MaterializeFormat::TailString => {
            let rows: Vec<usize> = (total.saturating_sub(n)..total).collect();
            render_rows(table, &rows)
        }
        MaterializeFormat::SampleString => {
            let mut rng = StdRng::seed_from_u64(options.sample_seed);
            let mut rows = rand::seq::index::sample(&mut rng, total, n.min(total)).into_vec();
            rows.sort_unstable();
            render_rows(table, &rows)
        }
        MaterializeFormat::FullString => {
            if total > options.max_rows {
                tracing::warn!(
                    rows = total,
                    max_rows = options.max_rows,
                    "full_string output truncated"
                );
                let rows: Vec<usize> = (0..options.max_rows).collect();
                format!(
                    "{}\n... (truncated to {} rows)",
                    render_rows(table, &rows),
                    options.max_rows
                )
            } else {
                let rows: Vec<usize> = (0..total).collect();
                render_rows(table, &rows)
            }
        }
        MaterializeFormat::JsonRecords => to_json_records(table)?,
        MaterializeFormat::JsonSplit => to_json_split(table)?,
        MaterializeFormat::Csv => to_csv(table),
    };

    Ok(output)
}

/// Renders the given rows as a text table with a leading row-position
/// column.
pub fn render_rows(table: &Table, rows: &[usize]) -> String {
    let mut text = TextTable::new();
    text.set_content_arrangement(ContentArrangement::Disabled)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    let mut header = vec![Cell::new("")];
    header.extend(table.column_names().into_iter().map(Cell::new));
    text.set_header(header);

    for &row in rows {
        let mut cells = vec![Cell::new(row)];
        cells.extend(table.columns().iter().map(|c| Cell::new(c.get(row))));
        text.add_row(cells);
    }

    text.to_string()
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => json!(*b),
        Value::Int(i) => json!(*i),
        // Non-finite floats have no JSON form and serialize as null.
        Value::Float(f) => json!(*f),
        Value::Text(s) => json!(s),
    }
}

fn from_json(value: &JsonValue) -> TabulaResult<Value> {
    match value {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| TabulaError::invalid_argument(format!("number {} out of range", n))),
        JsonValue::String(s) => Ok(Value::text(s.as_str())),
        other => Err(TabulaError::invalid_argument(format!(
            "nested JSON value {} cannot be a cell",
            other
        ))),
    }
}

fn to_json_records(table: &Table) -> TabulaResult<String> {
    let records: Vec<JsonValue> = table
        .rows()
        .map(|row| {
            let object: Map<String, JsonValue> = table
                .column_names()
                .into_iter()
                .zip(&row)
                .map(|(name, v)| (name.to_string(), to_json(v)))
                .collect();
            JsonValue::Object(object)
        })
        .collect();

    serde_json::to_string(&records).map_err(|e| TabulaError::internal(e.to_string()))
}

fn to_json_split(table: &Table) -> TabulaResult<String> {
    let data: Vec<Vec<JsonValue>> = table
        .rows()
        .map(|row| row.iter().map(to_json).collect())
        .collect();
    let payload = json!({
        "columns": table.column_names(),
        "index": (0..table.num_rows()).collect::<Vec<_>>(),
        "data": data,
    });

    serde_json::to_string(&payload).map_err(|e| TabulaError::internal(e.to_string()))
}

fn to_csv(table: &Table) -> String {
    let mut out = String::new();
    let header: Vec<String> = table.column_names().into_iter().map(escape_csv).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in table.rows() {
        let fields: Vec<String> = row
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                v => escape_csv(&v.to_string()),
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parses a `json_records` payload back into a table.
///
/// Column order follows first appearance; cells missing from a record are
/// NULL. Column types are inferred from the values.
pub fn parse_json_records(payload: &str) -> TabulaResult<Table> {
    let parsed: JsonValue = serde_json::from_str(payload)
        .map_err(|e| TabulaError::invalid_argument(format!("invalid JSON: {}", e)))?;
    let records = parsed
        .as_array()
        .ok_or_else(|| TabulaError::invalid_argument("expected a JSON array of records"))?;

    let mut names: Vec<String> = Vec::new();
    for record in records {
        let object = record
            .as_object()
            .ok_or_else(|| TabulaError::invalid_argument("every record must be a JSON object"))?;
        for key in object.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let values = records
            .iter()
            .map(|r| r.get(&name).map_or(Ok(Value::Null), from_json))
            .collect::<TabulaResult<Vec<_>>>()?;
        columns.push(Column::from_values(name, values));
    }

    Table::new(columns)
}
