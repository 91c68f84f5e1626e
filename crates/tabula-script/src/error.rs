//! Script errors.

use tabula_common::TabulaError;
use thiserror::Error;

/// Errors raised while parsing or running a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Error from the underlying sqlparser crate.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Valid SQL that the interpreter does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Script contains no statements.
    #[error("empty script")]
    EmptyScript,

    /// Referenced table is not bound in the scope.
    #[error("table '{0}' not found")]
    UnknownTable(String),

    /// Created table is already bound in the scope.
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// Referenced column does not exist.
    #[error("column '{0}' not found")]
    UnknownColumn(String),

    /// Unqualified column name matches more than one input column.
    #[error("column reference '{0}' is ambiguous")]
    AmbiguousColumn(String),

    /// Operand types do not fit the operator.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Function name is not known.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Function or clause argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A resource limit was hit.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Table construction failed.
    #[error(transparent)]
    Table(#[from] TabulaError),
}

impl From<sqlparser::parser::ParserError> for ScriptError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ScriptError::Syntax(err.to_string())
    }
}

impl ScriptError {
    /// Converts into the error reported by structured operations that
    /// evaluate expressions on a single table.
    pub fn into_operation_error(self) -> TabulaError {
        match self {
            ScriptError::UnknownColumn(column) => TabulaError::column_not_found(column),
            ScriptError::Table(err) => err,
            other => TabulaError::invalid_argument(other.to_string()),
        }
    }
}

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;
