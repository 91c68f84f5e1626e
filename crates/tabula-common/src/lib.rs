//! # tabula-common
//!
//! Common types and errors for Tabula.
//!
//! This crate provides the foundational types shared by every Tabula
//! component:
//!
//! - **Types**: scalar `Value`s, typed `Column`s, the columnar `Table`, and
//!   the opaque `Handle` that clients exchange instead of data
//! - **Errors**: Unified error handling with `TabulaError`
//! - **Constants**: Defaults and limits
//!
//! ## Example
//!
//! ```rust
//! use tabula_common::types::{Column, DataType, Table, Value};
//! use tabula_common::TabulaResult;
//!
//! fn example() -> TabulaResult<()> {
//!     let table = Table::new(vec![
//!         Column::new("id", DataType::Integer, vec![Value::Int(1), Value::Int(2)])?,
//!         Column::new("name", DataType::Text, vec![Value::text("a"), Value::text("b")])?,
//!     ])?;
//!     assert_eq!(table.shape(), (2, 2));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, TabulaError, TabulaResult};
pub use types::{Column, DataType, Field, Handle, Table, Value};
