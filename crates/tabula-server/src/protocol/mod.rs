//! Tool protocol.
//!
//! One JSON object per line in each direction. Requests are tagged by
//! `"op"` and may carry an `"id"` that the response echoes:
//!
//! ```text
//! -> {"id": 1, "op": "load_table", "table_name": "users"}
//! <- {"id":1,"ok":true,"result":{"handle":"6f1c..."}}
//! -> {"id": 2, "op": "shape", "handle": "nope"}
//! <- {"id":2,"ok":false,"error":{"kind":"HandleNotFound","code":256,"message":"handle 'nope' not found"}}
//! ```

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tabula_common::{Handle, TabulaError, TabulaResult, DEFAULT_COMBINE_SEPARATOR};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::materialize::MaterializeFormat;
use crate::ops::{Aggregation, JoinHow};
use crate::workspace::{Workspace, WorkspaceStats};

fn default_separator() -> String {
    DEFAULT_COMBINE_SEPARATOR.to_string()
}

/// A tool request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Load a seed table.
    LoadTable {
        /// Seed table name.
        table_name: String,
    },
    /// List the seed tables.
    ListTables,
    /// Concatenate two columns into a new one, in place.
    CombineColumns {
        /// Target table.
        handle: Handle,
        /// First source column.
        col1: String,
        /// Second source column.
        col2: String,
        /// Name of the new column.
        new_col: String,
        /// Separator placed between the two values.
        #[serde(default = "default_separator")]
        sep: String,
    },
    /// Join two tables.
    Join {
        /// Left table.
        handle1: Handle,
        /// Right table.
        handle2: Handle,
        /// Key column present in both.
        on_column: String,
        /// `inner`, `left`, `right` or `outer`.
        #[serde(default)]
        how: Option<String>,
    },
    /// Row and column counts.
    Shape {
        /// Target table.
        handle: Handle,
    },
    /// Preview the first rows.
    Head {
        /// Target table.
        handle: Handle,
    },
    /// Preview the first `n` rows.
    TopN {
        /// Target table.
        handle: Handle,
        /// Row count.
        n: i64,
    },
    /// Project columns.
    SelectColumns {
        /// Target table.
        handle: Handle,
        /// Columns to keep, in order.
        columns: Vec<String>,
    },
    /// Keep rows matching a predicate.
    FilterRows {
        /// Target table.
        handle: Handle,
        /// SQL boolean expression.
        expression: String,
    },
    /// Drop columns.
    DropColumns {
        /// Target table.
        handle: Handle,
        /// Columns to remove.
        columns: Vec<String>,
    },
    /// Remove duplicate rows.
    RemoveDuplicates {
        /// Target table.
        handle: Handle,
    },
    /// Distinct rows, optionally of some columns.
    DistinctRows {
        /// Target table.
        handle: Handle,
        /// Columns to deduplicate on.
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    /// Describe the columns.
    GetSchema {
        /// Target table.
        handle: Handle,
    },
    /// Group and aggregate.
    GroupBy {
        /// Target table.
        handle: Handle,
        /// Grouping columns.
        group_columns: Vec<String>,
        /// Aggregations, applied in order.
        aggregations: Vec<Aggregation>,
    },
    /// Run a script.
    Execute {
        /// Script text.
        source: String,
        /// Local name to handle.
        #[serde(default)]
        inputs: BTreeMap<String, Handle>,
        /// Names to register as outputs.
        #[serde(default)]
        outputs: Vec<String>,
    },
    /// Render a table as text.
    Materialize {
        /// Target table.
        handle: Handle,
        /// Output format; defaults to `head_string`.
        #[serde(default)]
        format: Option<String>,
        /// Row count for preview formats.
        #[serde(default)]
        n: Option<i64>,
    },
    /// Workspace statistics.
    Stats,
}

impl Request {
    /// Returns the operation name.
    pub fn op(&self) -> &'static str {
        match self {
            Request::LoadTable { .. } => "load_table",
            Request::ListTables => "list_tables",
            Request::CombineColumns { .. } => "combine_columns",
            Request::Join { .. } => "join",
            Request::Shape { .. } => "shape",
            Request::Head { .. } => "head",
            Request::TopN { .. } => "top_n",
            Request::SelectColumns { .. } => "select_columns",
            Request::FilterRows { .. } => "filter_rows",
            Request::DropColumns { .. } => "drop_columns",
            Request::RemoveDuplicates { .. } => "remove_duplicates",
            Request::DistinctRows { .. } => "distinct_rows",
            Request::GetSchema { .. } => "get_schema",
            Request::GroupBy { .. } => "group_by",
            Request::Execute { .. } => "execute",
            Request::Materialize { .. } => "materialize",
            Request::Stats => "stats",
        }
    }
}

/// A request line: the request plus an optional correlation id.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Echoed back in the response.
    #[serde(default)]
    pub id: Option<JsonValue>,
    /// The request itself.
    #[serde(flatten)]
    pub request: Request,
}

/// A successful result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    /// A new or mutated handle.
    Handle {
        /// The handle.
        handle: Handle,
    },
    /// Seed table names.
    Tables {
        /// Sorted names.
        tables: Vec<String>,
    },
    /// Table dimensions.
    Shape {
        /// Row count.
        rows: usize,
        /// Column count.
        columns: usize,
        /// `(rows, columns)`.
        text: String,
    },
    /// Rendered text.
    Text {
        /// The payload.
        text: String,
    },
    /// Output name to handle, in request order.
    Outputs {
        /// The mapping.
        outputs: Map<String, JsonValue>,
    },
    /// Statistics.
    Stats(WorkspaceStats),
}

/// Error details in a failure response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error kind, e.g. `HandleNotFound`.
    pub kind: String,
    /// Stable numeric code.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

impl From<&TabulaError> for ErrorBody {
    fn from(err: &TabulaError) -> Self {
        Self {
            kind: err.code().to_string(),
            code: err.code().as_u16(),
            message: err.to_string(),
        }
    }
}

/// A response line.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// The request id, if one was sent.
    pub id: Option<JsonValue>,
    /// Whether the request succeeded.
    pub ok: bool,
    /// Result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutput>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Builds a response from an operation result.
    pub fn new(id: Option<JsonValue>, result: TabulaResult<ToolOutput>) -> Self {
        match result {
            Ok(output) => Self {
                id,
                ok: true,
                result: Some(output),
                error: None,
            },
            Err(err) => Self {
                id,
                ok: false,
                result: None,
                error: Some(ErrorBody::from(&err)),
            },
        }
    }
}

/// Runs one request against the workspace.
pub fn dispatch(ws: &Workspace, request: Request) -> TabulaResult<ToolOutput> {
    let handle = |handle| ToolOutput::Handle { handle };

    match request {
        Request::LoadTable { table_name } => ws.load_table(&table_name).map(handle),
        Request::ListTables => Ok(ToolOutput::Tables {
            tables: ws.list_tables(),
        }),
        Request::CombineColumns {
            handle: h,
            col1,
            col2,
            new_col,
            sep,
        } => ws.combine_columns(&h, &col1, &col2, &new_col, &sep).map(handle),
        Request::Join {
            handle1,
            handle2,
            on_column,
            how,
        } => {
            let how = match how.as_deref().map(str::parse::<JoinHow>).transpose() {
                Ok(how) => how.unwrap_or_default(),
                Err(e) => return ws.reject("join", e),
            };
            ws.join(&handle1, &handle2, &on_column, how).map(handle)
        }
        Request::Shape { handle: h } => ws.shape(&h).map(|(rows, columns)| ToolOutput::Shape {
            rows,
            columns,
            text: format!("({}, {})", rows, columns),
        }),
        Request::Head { handle: h } => ws.head(&h).map(|text| ToolOutput::Text { text }),
        Request::TopN { handle: h, n } => ws.top_n(&h, n).map(|text| ToolOutput::Text { text }),
        Request::SelectColumns { handle: h, columns } => ws.select_columns(&h, &columns).map(handle),
        Request::FilterRows {
            handle: h,
            expression,
        } => ws.filter_rows(&h, &expression).map(handle),
        Request::DropColumns { handle: h, columns } => ws.drop_columns(&h, &columns).map(handle),
        Request::RemoveDuplicates { handle: h } => ws.remove_duplicates(&h).map(handle),
        Request::DistinctRows { handle: h, columns } => {
            ws.distinct_rows(&h, columns.as_deref()).map(handle)
        }
        Request::GetSchema { handle: h } => ws.get_schema(&h).map(handle),
        Request::GroupBy {
            handle: h,
            group_columns,
            aggregations,
        } => ws.group_by(&h, &group_columns, &aggregations).map(handle),
        Request::Execute {
            source,
            inputs,
            outputs,
        } => ws.execute(&source, &inputs, &outputs).map(|produced| {
            let outputs = produced
                .into_iter()
                .map(|(name, h)| (name, JsonValue::String(h.into_string())))
                .collect();
            ToolOutput::Outputs { outputs }
        }),
        Request::Materialize { handle: h, format, n } => {
            let format = match format
                .as_deref()
                .map(str::parse::<MaterializeFormat>)
                .transpose()
            {
                Ok(format) => format.unwrap_or_default(),
                Err(e) => return ws.reject("materialize", e),
            };
            ws.materialize(&h, format, n.unwrap_or(ws.config().preview_rows as i64))
                .map(|text| ToolOutput::Text { text })
        }
        Request::Stats => Ok(ToolOutput::Stats(ws.stats())),
    }
}

/// Handles one request line and returns the response line.
///
/// Blank lines yield `None`. A line that is not a valid request yields an
/// `InvalidArgument` failure, echoing the id if one could be read.
pub fn handle_line(ws: &Workspace, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let response = match serde_json::from_str::<Envelope>(line) {
        Ok(Envelope { id, request }) => {
            if ws.config().log_requests {
                tracing::info!(op = request.op(), "request");
            }
            Response::new(id, dispatch(ws, request))
        }
        Err(e) => {
            let id = serde_json::from_str::<JsonValue>(line)
                .ok()
                .and_then(|v| v.get("id").cloned());
            Response::new(
                id,
                Err(TabulaError::invalid_argument(format!("malformed request: {}", e))),
            )
        }
    };

    Some(encode(&response))
}

/// Serves request lines from `reader` until end of input, writing one
/// response line per request to `writer`.
///
/// Requests run one at a time on the blocking pool, so the task driving
/// this future keeps yielding (and can be raced against a shutdown signal)
/// while a long script executes.
pub async fn serve<R, W>(ws: Arc<Workspace>, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let ws = Arc::clone(&ws);
        let response = tokio::task::spawn_blocking(move || handle_line(&ws, &line))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let Some(mut response) = response else {
            continue;
        };
        response.push('\n');
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn encode(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to encode response");
        r#"{"id":null,"ok":false,"error":{"kind":"Internal","code":1,"message":"response encoding failed"}}"#
            .to_string()
    })
}
