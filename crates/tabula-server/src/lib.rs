//! # tabula-server
//!
//! Handle-indexed table store and the tool server on top of it.
//!
//! Clients never hold tables. They hold opaque handles, ask the server to
//! derive new tables from them, and materialize a table to text only when
//! they need to read it.
//!
//! This crate provides:
//!
//! - **Handle Store**: thread-safe map from handles to tables.
//!
//! - **Structured Operations**: joins, projections, filters, group-bys and
//!   friends, each a pure function over tables.
//!
//! - **Execution**: runs restricted SQL scripts against bound handles and
//!   registers their outputs (see `tabula-script`).
//!
//! - **Materializer**: text tables, JSON and CSV.
//!
//! - **Protocol**: the JSON-lines request format served by `tabulad`.
//!
//! # Quick Start
//!
//! ```
//! use tabula_server::ops::JoinHow;
//! use tabula_server::materialize::MaterializeFormat;
//! use tabula_server::Workspace;
//!
//! let ws = Workspace::in_memory().unwrap();
//! let users = ws.load_table("users").unwrap();
//! let orders = ws.load_table("orders").unwrap();
//!
//! let joined = ws.join(&users, &orders, "user_id", JoinHow::Inner).unwrap();
//! assert_eq!(ws.shape(&joined).unwrap(), (6, 6));
//!
//! let csv = ws.materialize(&joined, MaterializeFormat::Csv, 5).unwrap();
//! assert!(csv.starts_with("user_id,name,city,order_id,product,amount"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Seed tables.
pub mod catalog;

/// Server configuration.
pub mod config;

/// Script execution against stored handles.
pub mod exec;

/// Text, JSON and CSV rendering.
pub mod materialize;

/// Structured table operations.
pub mod ops;

/// JSON-lines tool protocol.
pub mod protocol;

/// Handle store.
pub mod store;

/// The workspace facade.
pub mod workspace;

pub use config::ServerConfig;
pub use store::HandleStore;
pub use workspace::{Workspace, WorkspaceStats};
