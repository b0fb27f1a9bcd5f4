//! End-to-end integration tests for Windlass.
//!
//! These tests drive the full path from script text through `Engine::get`
//! and `RunSession::run` to decoded output rows.

use windlass_common::config::{DuplicatePolicy, TableConfig};
use windlass_common::ErrorCode;
use windlass_engine::EngineError;
use windlass_sql::storage::Value;
use windlass_test::{
    init_tracing, run_decoded, standard_row, standard_schema, TableFixture, DATABASE,
};

const UDF_SCRIPT: &str = "%%fun
def test(a:i32,b:i32):i32
    c=a+b
    d=c+1
    return d
end
%%sql
SELECT test(col1,col1), col2 , col6 FROM t1 limit 10;";

const WINDOW_SCRIPT: &str = "SELECT sum(col1) OVER w1 as w1_col1_sum, sum(col3) OVER w1 as w1_col3_sum, \
     sum(col4) OVER w1 as w1_col4_sum, sum(col2) OVER w1 as w1_col2_sum, \
     sum(col5) OVER w1 as w1_col5_sum FROM t1 \
     WINDOW w1 AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 3 PRECEDING AND CURRENT ROW) limit 10;";

fn fixture() -> TableFixture {
    init_tracing();
    TableFixture::new("t1", standard_schema().expect("schema")).expect("fixture")
}

/// Two partitions keyed by the `col2` value: "5" with two rows, "55" with three.
fn window_fixture() -> TableFixture {
    let fixture = fixture();
    let rows = [
        ("5", 1, standard_row(1, 5, 1.1, 11.1, 1, "1")),
        ("5", 2, standard_row(2, 5, 2.2, 22.2, 2, "22")),
        ("55", 1, standard_row(3, 55, 3.3, 33.3, 1, "333")),
        ("55", 2, standard_row(4, 55, 4.4, 44.4, 2, "4444")),
        ("55", 3, standard_row(5, 55, 5.5, 55.5, 3, &"a".repeat(66))),
    ];
    for (key, ts, values) in rows.iter() {
        fixture.put(key, *ts, values).expect("put");
    }
    fixture
}

fn window_values(
    col1: i32,
    col3: f32,
    col4: f64,
    col2: i16,
    col5: i64,
) -> Vec<Value> {
    vec![
        Value::Int32(col1),
        Value::Float(col3),
        Value::Double(col4),
        Value::Int16(col2),
        Value::Int64(col5),
    ]
}

/// UDF projection: `test(32, 32)` is 32 + 32 + 1.
#[test]
fn test_udf_projection() {
    let fixture = fixture();
    for ts in 1..=3 {
        fixture
            .put("key1", ts, &standard_row(32, 16, 2.1, 3.1, 64, "1"))
            .expect("put");
    }

    let session = fixture.session(UDF_SCRIPT).expect("compile");
    assert_eq!(session.output_schema().len(), 3);
    assert_eq!(session.row_size(), None);

    let rows = run_decoded(&session, 2).expect("run");
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(
            row,
            &vec![
                Value::Int32(65),
                Value::Int16(16),
                Value::Varchar("1".to_string())
            ]
        );
    }
}

/// Second row of the first partition sums both of its rows.
#[test]
fn test_window_sum_first_partition() {
    let fixture = window_fixture();
    let session = fixture.session(WINDOW_SCRIPT).expect("compile");
    let rows = run_decoded(&session, 10).expect("run");

    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], window_values(1, 1.1, 11.1, 5, 1));
    assert_eq!(
        rows[1],
        window_values(3, 1.1f32 + 2.2f32, 11.1 + 22.2, 10, 3)
    );
}

/// Frames never cross partitions; the third row of "55" sees all three.
#[test]
fn test_window_sum_second_partition() {
    let fixture = window_fixture();
    let session = fixture.session(WINDOW_SCRIPT).expect("compile");
    let rows = run_decoded(&session, 10).expect("run");

    assert_eq!(rows[2], window_values(3, 3.3, 33.3, 55, 1));
    assert_eq!(
        rows[3],
        window_values(7, 3.3f32 + 4.4f32, 33.3 + 44.4, 110, 3)
    );
    assert_eq!(
        rows[4],
        window_values(12, 3.3f32 + 4.4f32 + 5.5f32, 33.3 + 44.4 + 55.5, 165, 6)
    );
}

#[test]
fn test_window_output_encoding() {
    let fixture = window_fixture();
    let session = fixture.session(WINDOW_SCRIPT).expect("compile");
    // header 6 + bitmap 1 + i32 4 + f32 4 + f64 8 + i16 2 + i64 8
    assert_eq!(session.row_size(), Some(33));

    let mut output = Vec::new();
    assert_eq!(session.run(&mut output, 10).expect("run"), 5);
    for row in &output {
        assert_eq!(row.len(), 33);
        assert_eq!(u32::from_le_bytes([row[2], row[3], row[4], row[5]]), 33);
    }
    assert_eq!(i32::from_le_bytes([output[1][7], output[1][8], output[1][9], output[1][10]]), 3);
    assert_eq!(i32::from_le_bytes([output[4][7], output[4][8], output[4][9], output[4][10]]), 12);
}

#[test]
fn test_window_frame_slides() {
    let fixture = window_fixture();
    let session = fixture
        .session(
            "SELECT sum(col1) OVER w AS s, count(*) OVER w AS n, max(col2) OVER w AS m FROM t1 \
             WINDOW w AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)",
        )
        .expect("compile");
    let rows = run_decoded(&session, 10).expect("run");

    let sums: Vec<Value> = rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(
        sums,
        vec![
            Value::Int32(1),
            Value::Int32(3),
            Value::Int32(3),
            Value::Int32(7),
            Value::Int32(9)
        ]
    );
    let counts: Vec<Value> = rows.iter().map(|r| r[1].clone()).collect();
    assert_eq!(
        counts,
        vec![
            Value::Int64(1),
            Value::Int64(2),
            Value::Int64(1),
            Value::Int64(2),
            Value::Int64(2)
        ]
    );
}

#[test]
fn test_unknown_column_fails_get() {
    let fixture = fixture();
    let engine = fixture.engine().expect("engine");
    let err = engine
        .get("SELECT col9 FROM t1", DATABASE)
        .expect_err("unknown column must not compile");
    assert_eq!(err.code(), ErrorCode::ResolutionError);
    assert!(matches!(err, EngineError::Plan(_)));
    assert_eq!(engine.stats().queries_failed, 1);
    assert_eq!(engine.stats().queries_compiled, 0);
}

#[test]
fn test_error_kinds_per_stage() {
    let fixture = fixture();
    let engine = fixture.engine().expect("engine");

    let err = engine.get("%%fun\ndef f(a:i32):i32\n return a\n%%sql\nSELECT f(col1) FROM t1", DATABASE);
    assert_eq!(err.expect_err("missing end").code(), ErrorCode::SyntaxError);

    let err = engine.get("%%fun\ndef f(a:i64):i16\n return a\nend\n%%sql\nSELECT f(col5) FROM t1", DATABASE);
    assert_eq!(err.expect_err("narrowing return").code(), ErrorCode::SyntaxError);

    let err = engine.get("SELECT nope(col1) FROM t1", DATABASE);
    assert_eq!(err.expect_err("unknown udf").code(), ErrorCode::ResolutionError);

    let err = engine.get(
        "SELECT sum(col1) OVER w FROM t1 \
         WINDOW w AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)",
        DATABASE,
    );
    assert_eq!(err.expect_err("unbounded frame").code(), ErrorCode::UnsupportedFrame);

    let err = engine.get("SELECT col1 FROM missing", DATABASE);
    assert_eq!(err.expect_err("missing table").code(), ErrorCode::NotFound);
}

#[test]
fn test_limit_and_max_rows() {
    let fixture = fixture();
    for ts in 1..=20 {
        fixture
            .put("k", ts, &standard_row(ts as i32, 1, 0.0, 0.0, 0, ""))
            .expect("put");
    }

    let limited = fixture.session("SELECT col1 FROM t1 LIMIT 5").expect("compile");
    assert_eq!(run_decoded(&limited, 100).expect("run").len(), 5);
    assert_eq!(run_decoded(&limited, 3).expect("run").len(), 3);

    let unlimited = fixture.session("SELECT col1 FROM t1").expect("compile");
    let rows = run_decoded(&unlimited, 100).expect("run");
    assert_eq!(rows.len(), 20);
    assert_eq!(rows[19], vec![Value::Int32(20)]);
}

#[test]
fn test_uninitialized_table_fails_run() {
    init_tracing();
    let fixture = TableFixture::uninitialized("t1", standard_schema().expect("schema"))
        .expect("fixture");
    let session = fixture.session("SELECT col1 FROM t1").expect("compile");

    let mut output = Vec::new();
    let err = session.run(&mut output, 10).expect_err("table is not initialized");
    assert_eq!(err.code(), ErrorCode::StorageError);
    assert!(output.is_empty());
}

#[test]
fn test_duplicate_timestamps() {
    init_tracing();
    let keep = TableFixture::new("t1", standard_schema().expect("schema")).expect("fixture");
    let overwrite = TableFixture::with_table_config(
        "t1",
        standard_schema().expect("schema"),
        TableConfig::default().with_duplicate_policy(DuplicatePolicy::Overwrite),
    )
    .expect("fixture");

    for fixture in [&keep, &overwrite] {
        fixture.put("k", 7, &standard_row(1, 0, 0.0, 0.0, 0, "")).expect("put");
        fixture.put("k", 7, &standard_row(2, 0, 0.0, 0.0, 0, "")).expect("put");
    }

    let rows = run_decoded(&keep.session("SELECT col1 FROM t1").expect("compile"), 10)
        .expect("run");
    assert_eq!(rows, vec![vec![Value::Int32(1)], vec![Value::Int32(2)]]);

    let rows = run_decoded(&overwrite.session("SELECT col1 FROM t1").expect("compile"), 10)
        .expect("run");
    assert_eq!(rows, vec![vec![Value::Int32(2)]]);
}

#[test]
fn test_explain() {
    let fixture = fixture();
    let session = fixture.session(UDF_SCRIPT).expect("compile");
    let text = session.explain();
    assert!(text.starts_with("Limit: fetch=10"));
    assert!(text.contains("module query_t1"));
}
