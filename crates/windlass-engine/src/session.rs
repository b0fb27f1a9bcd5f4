//! Run sessions.
//!
//! A `RunSession` is the product of one successful `Engine::get`: a compiled
//! callable bound to the table it reads and the schema it produces. Sessions
//! are not shared between threads; each caller obtains its own.

use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};
use windlass_sql::codegen::{Callable, FrameInput, IrModule};
use windlass_sql::storage::RowLayout;
use windlass_sql::{QueryPlan, Schema, TableHandle};

use super::error::EngineResult;

/// A compiled query bound to its source table.
pub struct RunSession {
    plan: QueryPlan,
    module: IrModule,
    callable: Box<dyn Callable>,
    handle: TableHandle,
    output_layout: RowLayout,
    default_max_rows: usize,
}

impl RunSession {
    pub(crate) fn new(
        plan: QueryPlan,
        module: IrModule,
        callable: Box<dyn Callable>,
        handle: TableHandle,
        default_max_rows: usize,
    ) -> Self {
        let output_layout = RowLayout::from_schema(&plan.output_schema);
        Self {
            plan,
            module,
            callable,
            handle,
            output_layout,
            default_max_rows,
        }
    }

    /// Runs the query and appends one encoded row per produced row.
    ///
    /// Rows are produced in natural scan order: partitions by ascending key
    /// bytes, rows by ascending timestamp. Production stops at
    /// `min(max_rows, LIMIT)`. Returns the number of rows appended.
    ///
    /// On failure `output` is left exactly as it was passed in.
    pub fn run(&self, output: &mut Vec<Vec<u8>>, max_rows: usize) -> EngineResult<usize> {
        let started = Instant::now();
        let original_len = output.len();
        let cap = self.plan.row_cap(max_rows);

        match self.drive(output, cap) {
            Ok(produced) => {
                debug!(
                    table = self.handle.name(),
                    rows = produced,
                    cap,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "run finished"
                );
                Ok(produced)
            }
            Err(err) => {
                output.truncate(original_len);
                warn!(table = self.handle.name(), code = %err.code(), error = %err, "run failed");
                Err(err)
            }
        }
    }

    /// Runs with the engine's configured default row cap.
    pub fn run_default(&self, output: &mut Vec<Vec<u8>>) -> EngineResult<usize> {
        self.run(output, self.default_max_rows)
    }

    fn drive(&self, output: &mut Vec<Vec<u8>>, cap: usize) -> EngineResult<usize> {
        let scan = self.handle.table.scan()?;
        let mut produced = 0;
        if cap == 0 {
            return Ok(0);
        }

        for partition in scan {
            let (_, rows) = partition?;
            for position in 0..rows.len() {
                let row = self.callable.call(FrameInput::new(&rows, position))?;
                output.push(row);
                produced += 1;
                if produced == cap {
                    return Ok(produced);
                }
            }
        }
        Ok(produced)
    }

    /// Byte size of every output row, when the output has no varchar column.
    pub fn row_size(&self) -> Option<usize> {
        if !self.output_layout.is_fixed_width() {
            return None;
        }
        self.output_layout
            .total_length(0)
            .ok()
            .map(|size| size as usize)
    }

    /// Schema of the produced rows.
    pub fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }

    /// Layout of the produced rows, for decoding them.
    pub fn output_layout(&self) -> &RowLayout {
        &self.output_layout
    }

    /// The logical plan.
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// The lowered module.
    pub fn module(&self) -> &IrModule {
        &self.module
    }

    /// The resolved source table.
    pub fn table(&self) -> &TableHandle {
        &self.handle
    }

    /// Renders the plan followed by the lowered module.
    pub fn explain(&self) -> String {
        format!("{}\n\n{}", self.plan, self.module)
    }
}

impl fmt::Debug for RunSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSession")
            .field("table", &self.handle.name())
            .field("module", &self.module.name)
            .field("output_schema", &self.plan.output_schema)
            .field("default_max_rows", &self.default_max_rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use windlass_common::config::EngineConfig;
    use windlass_common::ErrorCode;
    use windlass_sql::parser::DataType;
    use windlass_sql::storage::{decode_row, encode_row, Value};
    use windlass_sql::{MemoryCatalog, Table};

    use super::*;
    use crate::{Engine, EngineError};

    fn engine_with_rows(rows: &[(&str, u64, i32, i16)]) -> Engine {
        let schema = Schema::from_pairs(&[
            ("col1", DataType::Int32),
            ("col2", DataType::Int16),
        ])
        .unwrap();
        let layout = RowLayout::from_schema(&schema);
        let mut table = Table::new("t1", 1, 1, 1);
        table.init().unwrap();
        for (key, ts, a, b) in rows {
            let row = encode_row(&layout, &[Value::Int32(*a), Value::Int16(*b)]).unwrap();
            table.put(key, *ts, &row).unwrap();
        }
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.register("db", schema, table).unwrap();
        Engine::new(catalog, EngineConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_run_natural_order() {
        let engine = engine_with_rows(&[("b", 1, 3, 0), ("a", 2, 2, 0), ("a", 1, 1, 0)]);
        let session = engine.get("SELECT col1 FROM t1", "db").unwrap();

        let mut output = Vec::new();
        assert_eq!(session.run(&mut output, 10).unwrap(), 3);
        let layout = session.output_layout();
        let firsts: Vec<Value> = output
            .iter()
            .map(|row| decode_row(layout, row).unwrap().remove(0))
            .collect();
        assert_eq!(firsts, vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
    }

    #[test]
    fn test_run_respects_max_rows_and_limit() {
        let engine = engine_with_rows(&[("a", 1, 1, 0), ("a", 2, 2, 0), ("a", 3, 3, 0)]);

        let session = engine.get("SELECT col1 FROM t1", "db").unwrap();
        let mut output = Vec::new();
        assert_eq!(session.run(&mut output, 2).unwrap(), 2);
        assert_eq!(session.run(&mut output, 0).unwrap(), 0);
        assert_eq!(output.len(), 2);

        let session = engine.get("SELECT col1 FROM t1 LIMIT 1", "db").unwrap();
        let mut output = Vec::new();
        assert_eq!(session.run(&mut output, 10).unwrap(), 1);
    }

    #[test]
    fn test_run_appends_to_existing_output() {
        let engine = engine_with_rows(&[("a", 1, 1, 0)]);
        let session = engine.get("SELECT col1 FROM t1", "db").unwrap();
        let mut output = vec![vec![0xAB]];
        assert_eq!(session.run_default(&mut output).unwrap(), 1);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0], vec![0xAB]);
    }

    #[test]
    fn test_failed_run_leaves_output_untouched() {
        let engine = engine_with_rows(&[("a", 1, 4, 2), ("a", 2, 4, 0)]);
        let session = engine.get("SELECT col1 / col2 AS q FROM t1", "db").unwrap();

        let mut output = vec![vec![1u8]];
        let err = session.run(&mut output, 10).unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
        assert_eq!(err.code(), ErrorCode::ExecutionError);
        assert_eq!(output, vec![vec![1u8]]);
    }

    #[test]
    fn test_row_size() {
        let engine = engine_with_rows(&[]);
        let session = engine.get("SELECT col1, col2 FROM t1", "db").unwrap();
        // header 6 + bitmap 1 + i32 + i16
        assert_eq!(session.row_size(), Some(13));
    }

    #[test]
    fn test_explain_contains_plan_and_module() {
        let engine = engine_with_rows(&[]);
        let session = engine.get("SELECT col1 + 1 AS x FROM t1", "db").unwrap();
        let text = session.explain();
        assert!(text.contains("Scan: t1"));
        assert!(text.contains("module query_t1"));
        assert!(text.contains("ret"));
    }
}
