//! Configuration for the Windlass engine.
//!
//! This module provides configuration structures for the table store,
//! the code generator and the engine facade.

mod engine;

pub use engine::{
    CompileConfig, ConfigError, DuplicatePolicy, EngineConfig, EngineConfigBuilder, TableConfig,
};
