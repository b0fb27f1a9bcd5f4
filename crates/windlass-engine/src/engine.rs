//! Query engine.
//!
//! The `Engine` is the top-level entry point for Windlass. It owns the
//! table catalog, the code backend, and the configuration, and turns query
//! scripts into [`RunSession`]s.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use windlass_common::config::EngineConfig;
use windlass_sql::codegen::{backend_by_name, lower, Callable, CodeBackend, CompileError, IrModule};
use windlass_sql::parser::Parser;
use windlass_sql::{build_plan, TableCatalog};

use super::error::{EngineError, EngineResult};
use super::session::RunSession;

/// Engine statistics.
#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    /// Scripts compiled into sessions.
    pub queries_compiled: u64,
    /// Scripts that failed at any stage of `get`.
    pub queries_failed: u64,
    /// Total time spent in the code backend.
    pub compile_time: Duration,
    /// Name of the active code backend.
    pub backend: &'static str,
    /// Uptime.
    pub uptime: Duration,
}

/// The query engine.
pub struct Engine {
    /// Configuration.
    config: EngineConfig,
    /// Resolves table names to schema + storage.
    catalog: Arc<dyn TableCatalog>,
    /// Compiles IR modules.
    backend: Arc<dyn CodeBackend>,
    /// Scripts compiled.
    queries_compiled: AtomicU64,
    /// Scripts rejected.
    queries_failed: AtomicU64,
    /// Backend time in microseconds.
    compile_micros: AtomicU64,
    /// When the engine was created.
    started_at: Instant,
}

impl Engine {
    /// Creates an engine using the backend named in `config.compile.backend`.
    pub fn new(catalog: Arc<dyn TableCatalog>, config: EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::Config)?;
        let backend = backend_by_name(&config.compile.backend)?;
        Ok(Self::assemble(catalog, backend, config))
    }

    /// Creates an engine with a caller-supplied backend.
    ///
    /// `config.compile.backend` is ignored; the timeout still applies.
    pub fn with_backend(
        catalog: Arc<dyn TableCatalog>,
        backend: Arc<dyn CodeBackend>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::Config)?;
        Ok(Self::assemble(catalog, backend, config))
    }

    fn assemble(
        catalog: Arc<dyn TableCatalog>,
        backend: Arc<dyn CodeBackend>,
        config: EngineConfig,
    ) -> Self {
        info!(
            backend = backend.name(),
            compile_timeout_ms = config.compile.timeout_ms,
            default_max_rows = config.default_max_rows,
            "engine started"
        );
        Self {
            config,
            catalog,
            backend,
            queries_compiled: AtomicU64::new(0),
            queries_failed: AtomicU64::new(0),
            compile_micros: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compiles `script` against a table in `database`.
    ///
    /// The script is an optional `%%fun` UDF block followed by `%%sql`,
    /// or bare SQL. On failure no session exists and the error carries
    /// the code of the stage that failed.
    pub fn get(&self, script: &str, database: &str) -> EngineResult<RunSession> {
        let started = Instant::now();
        match self.prepare(script, database) {
            Ok(session) => {
                self.queries_compiled.fetch_add(1, Ordering::Relaxed);
                info!(
                    table = session.table().name(),
                    database,
                    columns = session.output_schema().len(),
                    windowed = session.plan().is_windowed(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "query compiled"
                );
                Ok(session)
            }
            Err(err) => {
                self.queries_failed.fetch_add(1, Ordering::Relaxed);
                warn!(database, code = %err.code(), error = %err, "query rejected");
                Err(err)
            }
        }
    }

    fn prepare(&self, script: &str, database: &str) -> EngineResult<RunSession> {
        let parsed = Parser::parse_script(script)?;
        let handle = self.catalog.resolve(database, &parsed.select.from)?;
        let plan = build_plan(&parsed, &handle)?;
        debug!(plan = %plan, "plan built");
        let module = lower(&plan)?;
        let callable = self.compile_module(&module)?;
        Ok(RunSession::new(
            plan,
            module,
            callable,
            handle,
            self.config.default_max_rows,
        ))
    }

    fn compile_module(&self, module: &IrModule) -> Result<Box<dyn Callable>, CompileError> {
        let started = Instant::now();
        let callable = self.backend.compile(module)?;
        let elapsed = started.elapsed();
        self.compile_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        if let Some(limit) = self.config.compile.timeout() {
            if elapsed > limit {
                return Err(CompileError::Timeout {
                    module: module.name.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    limit_ms: limit.as_millis() as u64,
                });
            }
        }

        debug!(
            module = %module.name,
            backend = self.backend.name(),
            insts = module.insts.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "module compiled"
        );
        Ok(callable)
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            queries_compiled: self.queries_compiled.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            compile_time: Duration::from_micros(self.compile_micros.load(Ordering::Relaxed)),
            backend: self.backend.name(),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use windlass_common::ErrorCode;
    use windlass_sql::codegen::ClosureBackend;
    use windlass_sql::parser::DataType;
    use windlass_sql::{MemoryCatalog, Schema, Table};

    fn catalog() -> Arc<MemoryCatalog> {
        let schema = Schema::from_pairs(&[
            ("col1", DataType::Int32),
            ("col2", DataType::Int16),
        ])
        .unwrap();
        let mut table = Table::new("t1", 1, 1, 1);
        table.init().unwrap();
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.register("db", schema, table).unwrap();
        catalog
    }

    struct SlowBackend;

    impl CodeBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn compile(&self, module: &IrModule) -> Result<Box<dyn Callable>, CompileError> {
            thread::sleep(Duration::from_millis(30));
            ClosureBackend::new().compile(module)
        }
    }

    #[test]
    fn test_get_compiles_session() {
        let engine = Engine::new(catalog(), EngineConfig::for_testing()).unwrap();
        let session = engine.get("SELECT col1, col2 FROM t1", "db").unwrap();
        assert_eq!(session.output_schema().len(), 2);
        assert_eq!(session.table().name(), "t1");

        let stats = engine.stats();
        assert_eq!(stats.queries_compiled, 1);
        assert_eq!(stats.queries_failed, 0);
        assert_eq!(stats.backend, "closure");
    }

    #[test]
    fn test_get_reports_stage_codes() {
        let engine = Engine::new(catalog(), EngineConfig::for_testing()).unwrap();

        let err = engine.get("SELECT col9 FROM t1", "db").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ResolutionError);

        let err = engine.get("SELEC col1 FROM t1", "db").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SyntaxError);

        let err = engine.get("SELECT col1 FROM t2", "db").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = engine.get("SELECT col1 FROM t1", "other").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        assert_eq!(engine.stats().queries_failed, 4);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = EngineConfig::for_testing();
        config.compile.backend = "llvm".to_string();
        let err = Engine::new(catalog(), config).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Compile(CompileError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::for_testing();
        config.table.segment_count = 0;
        let err = Engine::new(catalog(), config).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_compile_timeout() {
        let config = EngineConfig::builder().compile_timeout_ms(1).build();
        let engine = Engine::with_backend(catalog(), Arc::new(SlowBackend), config).unwrap();
        let err = engine.get("SELECT col1 FROM t1", "db").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Compile(CompileError::Timeout { limit_ms: 1, .. })
        ));
        assert_eq!(err.code(), ErrorCode::CompileError);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let config = EngineConfig::builder().compile_timeout_ms(0).build();
        let engine = Engine::with_backend(catalog(), Arc::new(SlowBackend), config).unwrap();
        assert!(engine.get("SELECT col1 FROM t1", "db").is_ok());
        assert!(engine.stats().compile_time >= Duration::from_millis(30));
    }
}
