//! Tabula error types.
//!
//! Every failure an operation can report to a caller is a `TabulaError`.
//! All of them are local and recoverable: they carry enough context (the
//! offending handle, column or name) for the caller to retry with corrected
//! input.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// Materialization format outside the supported set.
    UnsupportedFormat = 0x0004,

    // Handle errors (0x0100 - 0x01FF)
    /// Handle is not present in the store.
    HandleNotFound = 0x0100,

    // Catalog errors (0x0200 - 0x02FF)
    /// Seed table name is not defined.
    UnknownTable = 0x0200,

    // Schema errors (0x0300 - 0x03FF)
    /// Column not found.
    ColumnNotFound = 0x0300,
    /// Column already exists.
    ColumnExists = 0x0301,

    // Execution errors (0x0400 - 0x04FF)
    /// A declared output was not produced by the script.
    OutputNotProduced = 0x0400,
    /// Script execution failed.
    ExecutionFailed = 0x0401,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Handle",
            0x02 => "Catalog",
            0x03 => "Schema",
            0x04 => "Execution",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for Tabula.
///
/// # Example
///
/// ```rust
/// use tabula_common::error::{ErrorCode, TabulaError, TabulaResult};
///
/// fn lookup(handle: &str) -> TabulaResult<()> {
///     Err(TabulaError::handle_not_found(handle))
/// }
///
/// let err = lookup("nope").unwrap_err();
/// assert_eq!(err.code(), ErrorCode::HandleNotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TabulaError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Materialization format is not one of the supported formats.
    #[error(
        "unsupported format '{format}'; valid formats are: head_string, tail_string, \
         sample_string, full_string, json_records, json_split, csv"
    )]
    UnsupportedFormat {
        /// The requested format.
        format: String,
    },

    // ==========================================================================
    // Handle Errors
    // ==========================================================================
    /// The handle does not refer to a stored table.
    #[error("handle '{handle}' not found")]
    HandleNotFound {
        /// The missing handle.
        handle: String,
    },

    // ==========================================================================
    // Catalog Errors
    // ==========================================================================
    /// The seed catalog has no table with this name.
    #[error("table '{name}' not found; available tables: {}", available.join(", "))]
    UnknownTable {
        /// The requested table name.
        name: String,
        /// Names the catalog does define.
        available: Vec<String>,
    },

    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    /// One or more columns are missing.
    #[error("column(s) not found: {}", columns.join(", "))]
    ColumnNotFound {
        /// The missing column names.
        columns: Vec<String>,
    },

    /// A column with this name already exists.
    #[error("column '{column}' already exists")]
    ColumnExists {
        /// The clashing column name.
        column: String,
    },

    // ==========================================================================
    // Execution Errors
    // ==========================================================================
    /// A declared output name was not bound when the script finished.
    #[error("expected output '{name}' was not produced")]
    OutputNotProduced {
        /// The missing output name.
        name: String,
    },

    /// The script failed to parse or raised an error while running.
    #[error("execution failed: {message}")]
    ExecutionFailed {
        /// The underlying error message.
        message: String,
    },
}

impl TabulaError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            Self::HandleNotFound { .. } => ErrorCode::HandleNotFound,
            Self::UnknownTable { .. } => ErrorCode::UnknownTable,
            Self::ColumnNotFound { .. } => ErrorCode::ColumnNotFound,
            Self::ColumnExists { .. } => ErrorCode::ColumnExists,
            Self::OutputNotProduced { .. } => ErrorCode::OutputNotProduced,
            Self::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
        }
    }

    /// Returns true if the error was caused by a bad argument value rather
    /// than by missing data.
    #[must_use]
    pub const fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::UnsupportedFormat { .. }
        )
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a handle-not-found error.
    #[must_use]
    pub fn handle_not_found(handle: impl Into<String>) -> Self {
        Self::HandleNotFound {
            handle: handle.into(),
        }
    }

    /// Creates a column-not-found error for a single column.
    #[must_use]
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            columns: vec![column.into()],
        }
    }

    /// Creates a column-exists error.
    #[must_use]
    pub fn column_exists(column: impl Into<String>) -> Self {
        Self::ColumnExists {
            column: column.into(),
        }
    }

    /// Creates an execution-failed error.
    #[must_use]
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = TabulaError::handle_not_found("abc");
        assert_eq!(err.code(), ErrorCode::HandleNotFound);
        assert_eq!(err.code().category(), "Handle");
        assert_eq!(err.code().as_u16(), 0x0100);
    }

    #[test]
    fn test_error_display() {
        let err = TabulaError::handle_not_found("abc");
        assert_eq!(err.to_string(), "handle 'abc' not found");

        let err = TabulaError::UnknownTable {
            name: "products".to_string(),
            available: vec!["orders".to_string(), "users".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "table 'products' not found; available tables: orders, users"
        );

        let err = TabulaError::ColumnNotFound {
            columns: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "column(s) not found: a, b");
    }

    #[test]
    fn test_code_names() {
        assert_eq!(ErrorCode::OutputNotProduced.to_string(), "OutputNotProduced");
        assert_eq!(ErrorCode::UnsupportedFormat.category(), "General");
        assert_eq!(ErrorCode::ColumnExists.category(), "Schema");
    }

    #[test]
    fn test_argument_errors() {
        assert!(TabulaError::invalid_argument("n must be positive").is_argument_error());
        assert!(TabulaError::UnsupportedFormat {
            format: "xml".to_string()
        }
        .is_argument_error());
        assert!(!TabulaError::column_exists("full").is_argument_error());
    }
}
