//! # windlass-sql
//!
//! Compile pipeline and storage layer for Windlass.
//!
//! This crate turns an embedded query script into a callable and provides
//! the row store that the callable reads:
//!
//! - **Parser**: the `%%fun` UDF mini-language and the `%%sql` SELECT surface
//! - **Logical**: schemas, arena-based expression trees, and the planner
//!   that resolves columns, UDF calls, and window frames
//! - **Codegen**: lowering of a plan into a straight-line IR and the
//!   `CodeBackend` seam that compiles IR into a callable
//! - **Storage**: the binary row codec, the versioned table store, and the
//!   table catalog
//!
//! ## Pipeline
//!
//! ```text
//! script ──► split ──► UDF parser ──┐
//!                  └─► SQL parser ──┴─► planner ──► lower ──► CodeBackend ──► Callable
//!                                          ▲                                     │
//!                                     TableCatalog                         Table rows
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod logical;
pub mod parser;
pub mod storage;

pub use codegen::{Callable, ClosureBackend, CodeBackend, CompileError, IrModule};
pub use logical::{build_plan, Field, PlanError, QueryPlan, Schema, SchemaRef};
pub use parser::{DataType, ParseError, Script};
pub use storage::{
    MemoryCatalog, RowBuilder, RowLayout, RowView, StorageError, Table, TableCatalog, TableHandle,
    Value,
};
