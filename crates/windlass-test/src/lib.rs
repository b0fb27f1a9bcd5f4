//! # windlass-test
//!
//! End-to-end tests for Windlass.
//!
//! This crate contains:
//! - Fixtures that build schemas, encode rows, and load tables into a catalog
//! - Scenario tests under `tests/` driving `Engine::get` and `RunSession::run`

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Table and schema fixtures.
pub mod fixtures;

pub use fixtures::{run_decoded, standard_row, standard_schema, TableFixture, DATABASE};

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
