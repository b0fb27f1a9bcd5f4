//! Benchmark data generators.
//!
//! Every generator seeds its own `StdRng` with 42 so runs are comparable.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use windlass_common::config::EngineConfig;
use windlass_engine::Engine;
use windlass_sql::parser::DataType;
use windlass_sql::storage::{encode_row, MemoryCatalog, RowLayout, Table, Value};
use windlass_sql::Schema;

/// Database the benchmark table is registered under.
pub const DATABASE: &str = "bench";

/// Generates a random alphanumeric string.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// `col1 i32, col2 i16, col3 float, col4 double, col5 i64, col6 varchar`.
pub fn bench_schema() -> Schema {
    Schema::from_pairs(&[
        ("col1", DataType::Int32),
        ("col2", DataType::Int16),
        ("col3", DataType::Float),
        ("col4", DataType::Double),
        ("col5", DataType::Int64),
        ("col6", DataType::Varchar),
    ])
    .expect("bench schema")
}

/// Generates `count` random rows of [`bench_schema`] with varchars of
/// `varchar_len` bytes.
pub fn generate_rows(count: usize, varchar_len: usize) -> Vec<Vec<Value>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            vec![
                Value::Int32(rng.gen_range(-1000..1000)),
                Value::Int16(rng.gen_range(0..100)),
                Value::Float(rng.gen()),
                Value::Double(rng.gen()),
                Value::Int64(i as i64),
                Value::Varchar(random_string(&mut rng, varchar_len)),
            ]
        })
        .collect()
}

/// Encodes rows against the layout of [`bench_schema`].
pub fn encode_rows(rows: &[Vec<Value>]) -> Vec<Vec<u8>> {
    let layout = RowLayout::from_schema(&bench_schema());
    rows.iter()
        .filter_map(|values| encode_row(&layout, values).ok())
        .collect()
}

/// Builds an engine over a table `t1` holding `rows` rows spread across
/// `partitions` keys, timestamps ascending within each key.
pub fn loaded_engine(rows: usize, partitions: usize) -> Engine {
    let schema = bench_schema();
    let encoded = encode_rows(&generate_rows(rows, 16));
    let config = EngineConfig::default();

    let mut table = Table::with_config("t1", 1, 1, 1, config.table.clone());
    table.init().expect("bench table init");
    let partitions = partitions.max(1);
    for (i, row) in encoded.iter().enumerate() {
        let key = format!("p{:04}", i % partitions);
        table
            .put(key, (i / partitions) as u64, row)
            .expect("bench put");
    }

    let catalog = Arc::new(MemoryCatalog::new());
    catalog
        .register(DATABASE, schema, table)
        .expect("bench register");
    Engine::new(catalog, config).expect("bench engine")
}
