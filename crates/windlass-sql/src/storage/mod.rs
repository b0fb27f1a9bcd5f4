//! Storage layer.
//!
//! This module owns everything that touches encoded rows:
//!
//! - the binary row codec shared by the store and compiled callables
//! - the versioned, partitioned table store
//! - the table catalog that resolves names to schema + storage
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Engine / RunSession                      │
//! └──────────────────────────────────────────────────────────┘
//!           │ resolve                         │ scan
//!           ▼                                 ▼
//! ┌──────────────────┐   ┌────────────────────────────────────┐
//! │   TableCatalog   │──►│ Table: (key, ts) → encoded row     │
//! │ (schema + table) │   │  segments ── RwLock ── chains      │
//! └──────────────────┘   └────────────────────────────────────┘
//!                                     ▲
//!                                     │ Bytes produced by
//!                              ┌──────────────┐
//!                              │  Row codec   │
//!                              └──────────────┘
//! ```

mod catalog;
mod codec;
mod error;
mod table;
mod value;

pub use catalog::{MemoryCatalog, TableCatalog, TableHandle};
pub use codec::{
    decode_row, encode_row, CodecError, CodecResult, RowBuilder, RowLayout, RowView,
    FORMAT_VERSION, HEADER_LENGTH, SCHEMA_VERSION,
};
pub use error::{StorageError, StorageResult};
pub use table::{RowEntry, Table, TableScan, TableState};
pub use value::Value;
