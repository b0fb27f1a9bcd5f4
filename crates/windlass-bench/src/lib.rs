//! Windlass Performance Benchmarks
//!
//! This crate contains benchmarks for the Windlass components:
//! - Row codec (encode, view, decode)
//! - Table store (put, scan)
//! - End-to-end compile and run, plain and windowed
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p windlass-bench
//! ```

pub mod utils;
