//! Table fixtures.
//!
//! A [`TableFixture`] owns a [`MemoryCatalog`] holding one table, plus the
//! row layout needed to encode rows for it.

use std::sync::Arc;

use anyhow::{Context, Result};
use windlass_common::config::{EngineConfig, TableConfig};
use windlass_common::Timestamp;
use windlass_engine::{Engine, RunSession};
use windlass_sql::parser::DataType;
use windlass_sql::storage::{decode_row, encode_row, RowLayout, Table, TableHandle, Value};
use windlass_sql::{MemoryCatalog, Schema};

/// Database name every fixture registers its table under.
pub const DATABASE: &str = "db";

/// The six-column schema the scenarios use:
/// `col1 i32, col2 i16, col3 float, col4 double, col5 i64, col6 varchar`.
pub fn standard_schema() -> Result<Schema> {
    Ok(Schema::from_pairs(&[
        ("col1", DataType::Int32),
        ("col2", DataType::Int16),
        ("col3", DataType::Float),
        ("col4", DataType::Double),
        ("col5", DataType::Int64),
        ("col6", DataType::Varchar),
    ])?)
}

/// One row of [`standard_schema`].
pub fn standard_row(col1: i32, col2: i16, col3: f32, col4: f64, col5: i64, col6: &str) -> Vec<Value> {
    vec![
        Value::Int32(col1),
        Value::Int16(col2),
        Value::Float(col3),
        Value::Double(col4),
        Value::Int64(col5),
        Value::Varchar(col6.to_string()),
    ]
}

/// A catalog with one registered table.
pub struct TableFixture {
    catalog: Arc<MemoryCatalog>,
    handle: TableHandle,
    layout: RowLayout,
    config: EngineConfig,
}

impl TableFixture {
    /// Registers an initialized table `name` with the test configuration.
    pub fn new(name: &str, schema: Schema) -> Result<Self> {
        Self::with_table_config(name, schema, EngineConfig::for_testing().table)
    }

    /// Registers an initialized table with an explicit table configuration.
    pub fn with_table_config(name: &str, schema: Schema, table: TableConfig) -> Result<Self> {
        let mut storage = Table::with_config(name, 1, 1, 1, table.clone());
        storage.init().context("table init")?;
        Self::register(schema, storage, table)
    }

    /// Registers a table that was never initialized.
    pub fn uninitialized(name: &str, schema: Schema) -> Result<Self> {
        let table = EngineConfig::for_testing().table;
        let storage = Table::with_config(name, 1, 1, 1, table.clone());
        Self::register(schema, storage, table)
    }

    fn register(schema: Schema, storage: Table, table: TableConfig) -> Result<Self> {
        let layout = RowLayout::from_schema(&schema);
        let catalog = Arc::new(MemoryCatalog::new());
        let handle = catalog.register(DATABASE, schema, storage)?;
        let config = EngineConfig {
            table,
            ..EngineConfig::for_testing()
        };
        Ok(Self {
            catalog,
            handle,
            layout,
            config,
        })
    }

    /// Encodes `values` and stores them under `(key, ts)`.
    pub fn put(&self, key: &str, ts: u64, values: &[Value]) -> Result<()> {
        let row = encode_row(&self.layout, values).context("encode row")?;
        self.handle.table.put(key, Timestamp::new(ts), &row)?;
        Ok(())
    }

    /// Creates an engine over this fixture's catalog.
    pub fn engine(&self) -> Result<Engine> {
        Ok(Engine::new(self.catalog.clone(), self.config.clone())?)
    }

    /// Compiles `script` and returns the session.
    pub fn session(&self, script: &str) -> Result<RunSession> {
        Ok(self.engine()?.get(script, DATABASE)?)
    }

    /// The registered table.
    pub fn handle(&self) -> &TableHandle {
        &self.handle
    }
}

/// Runs `session` and decodes every produced row.
pub fn run_decoded(session: &RunSession, max_rows: usize) -> Result<Vec<Vec<Value>>> {
    let mut output = Vec::new();
    session.run(&mut output, max_rows)?;
    output
        .iter()
        .map(|row| decode_row(session.output_layout(), row).context("decode output row"))
        .collect()
}
