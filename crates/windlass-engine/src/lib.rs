//! # windlass-engine
//!
//! The facade that turns a query script into a runnable session.
//!
//! [`Engine::get`] parses the script, resolves its source table through the
//! configured [`TableCatalog`](windlass_sql::TableCatalog), plans, lowers,
//! and compiles it. The resulting [`RunSession`] owns the compiled callable
//! and drives it over the table with [`RunSession::run`].
//!
//! ```text
//! Engine::get(script, db)
//!   │  Parser::parse_script ──► TableCatalog::resolve ──► build_plan
//!   │  ──► lower ──► CodeBackend::compile
//!   ▼
//! RunSession::run(output, max_rows)
//!   │  for each partition (ascending key), each row (ascending ts):
//!   │      callable(partition, position) ──► output row
//!   ▼
//! Vec<Vec<u8>>  (caller-owned encoded rows)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use windlass_common::config::EngineConfig;
//! use windlass_engine::Engine;
//! use windlass_sql::parser::DataType;
//! use windlass_sql::storage::{encode_row, MemoryCatalog, Table, Value};
//! use windlass_sql::Schema;
//!
//! let schema = Schema::from_pairs(&[("col1", DataType::Int32)]).unwrap();
//! let mut table = Table::new("t1", 1, 1, 1);
//! table.init().unwrap();
//! let catalog = Arc::new(MemoryCatalog::new());
//! let handle = catalog.register("db", schema, table).unwrap();
//!
//! let layout = windlass_sql::RowLayout::from_schema(&handle.schema);
//! let row = encode_row(&layout, &[Value::Int32(41)]).unwrap();
//! handle.table.put("k1", 1u64, &row).unwrap();
//!
//! let engine = Engine::new(catalog, EngineConfig::default()).unwrap();
//! let session = engine.get("SELECT col1 + 1 AS answer FROM t1", "db").unwrap();
//! let mut output = Vec::new();
//! assert_eq!(session.run(&mut output, 10).unwrap(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod engine;
mod error;
mod session;

pub use engine::{Engine, EngineStats};
pub use error::{EngineError, EngineResult};
pub use session::RunSession;
