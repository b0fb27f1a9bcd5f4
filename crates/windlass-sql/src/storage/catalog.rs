//! Table catalog.
//!
//! The engine never creates tables; it resolves them through a
//! [`TableCatalog`] supplied by the embedding application. [`MemoryCatalog`]
//! is the in-process implementation used by tests and tools.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::logical::SchemaRef;

use super::error::{StorageError, StorageResult};
use super::table::Table;

/// Schema plus storage for one resolved table.
#[derive(Debug, Clone)]
pub struct TableHandle {
    /// Table schema. Read-only for the engine.
    pub schema: SchemaRef,
    /// Row store.
    pub table: Arc<Table>,
}

impl TableHandle {
    /// Creates a handle.
    pub fn new(schema: impl Into<SchemaRef>, table: impl Into<Arc<Table>>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        self.table.name()
    }
}

/// Resolves `(database, table)` to a [`TableHandle`].
pub trait TableCatalog: Send + Sync {
    /// Resolves a table by name.
    fn resolve(&self, database: &str, table: &str) -> StorageResult<TableHandle>;

    /// Resolves a table by numeric id.
    fn resolve_by_id(&self, database: &str, id: u32) -> StorageResult<TableHandle>;
}

/// In-memory catalog keyed by database, then table name.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    databases: RwLock<HashMap<String, HashMap<String, TableHandle>>>,
}

impl MemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under `database`.
    ///
    /// Fails if the database already holds a table with the same name or id.
    pub fn register(
        &self,
        database: &str,
        schema: impl Into<SchemaRef>,
        table: impl Into<Arc<Table>>,
    ) -> StorageResult<TableHandle> {
        let handle = TableHandle::new(schema, table);
        let mut databases = self.databases.write();
        let tables = databases.entry(database.to_string()).or_default();

        if tables.contains_key(handle.name())
            || tables.values().any(|t| t.table.id() == handle.table.id())
        {
            return Err(StorageError::TableExists(format!(
                "{}.{}",
                database,
                handle.name()
            )));
        }

        tracing::debug!(database, table = handle.name(), id = handle.table.id(), "table registered");
        tables.insert(handle.name().to_string(), handle.clone());
        Ok(handle)
    }

    /// Removes a table.
    pub fn deregister(&self, database: &str, table: &str) -> StorageResult<TableHandle> {
        self.databases
            .write()
            .get_mut(database)
            .and_then(|tables| tables.remove(table))
            .ok_or_else(|| StorageError::TableNotFound(format!("{}.{}", database, table)))
    }

    /// Lists table names in a database, sorted.
    pub fn list_tables(&self, database: &str) -> Vec<String> {
        let databases = self.databases.read();
        let mut names: Vec<String> = databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl TableCatalog for MemoryCatalog {
    fn resolve(&self, database: &str, table: &str) -> StorageResult<TableHandle> {
        self.databases
            .read()
            .get(database)
            .and_then(|tables| tables.get(table))
            .cloned()
            .ok_or_else(|| StorageError::TableNotFound(format!("{}.{}", database, table)))
    }

    fn resolve_by_id(&self, database: &str, id: u32) -> StorageResult<TableHandle> {
        self.databases
            .read()
            .get(database)
            .and_then(|tables| tables.values().find(|t| t.table.id() == id))
            .cloned()
            .ok_or_else(|| StorageError::TableNotFound(format!("{}.#{}", database, id)))
    }
}
