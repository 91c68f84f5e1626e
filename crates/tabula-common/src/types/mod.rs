//! Type definitions for Tabula.
//!
//! This module contains the tabular value model shared by every component.

mod column;
mod handle;
mod table;
mod value;

pub use column::{Column, DataType, Field};
pub use handle::Handle;
pub use table::Table;
pub use value::{format_float, Value};
