//! System-wide constants for Tabula.
//!
//! Defaults here are the values a fresh `ServerConfig` starts from; the
//! server can override most of them at startup.

// =============================================================================
// Preview Constants
// =============================================================================

/// Number of rows shown by `head` and the default for row-count arguments.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Maximum number of rows returned by row previews and full dumps.
///
/// `top_n` caps its argument here and `full_string` truncates past it.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Seed used for `sample_string` materialization.
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

// =============================================================================
// Script Limits
// =============================================================================

/// Maximum number of statements in a single script.
pub const DEFAULT_MAX_SCRIPT_STATEMENTS: usize = 256;

/// Maximum number of rows in any table a script produces.
pub const DEFAULT_MAX_SCRIPT_ROWS: usize = 1_000_000;

/// Maximum nesting depth of a single script expression.
///
/// Lowering and evaluation recurse once per level, so this bounds their
/// stack use. `a + b + c` has depth 3.
pub const MAX_EXPR_DEPTH: usize = 64;

/// Name bound to the result of a bare query in a script.
pub const RESULT_BINDING: &str = "result";

// =============================================================================
// Operation Defaults
// =============================================================================

/// Default separator for `combine_columns`.
pub const DEFAULT_COMBINE_SEPARATOR: &str = " ";

/// Suffix appended to left-side column names that clash in a join.
pub const JOIN_LEFT_SUFFIX: &str = "_x";

/// Suffix appended to right-side column names that clash in a join.
pub const JOIN_RIGHT_SUFFIX: &str = "_y";
