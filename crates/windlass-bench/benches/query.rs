//! End-to-end query benchmarks.
//!
//! Benchmarks for:
//! - Compiling scripts (parse, plan, lower, backend)
//! - Running plain projections with an inlined UDF
//! - Running sliding-window aggregates

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use windlass_bench::utils::{loaded_engine, DATABASE};

const UDF_SCRIPT: &str = "%%fun
def scale(a:i32,b:i64):i64
    c = a * 3
    return c + b
end
%%sql
SELECT scale(col1, col5) AS s, col2, col6 FROM t1";

const WINDOW_SCRIPT: &str = "SELECT sum(col1) OVER w AS s, avg(col4) OVER w AS a, max(col5) OVER w AS m \
     FROM t1 WINDOW w AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 16 PRECEDING AND CURRENT ROW)";

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/compile");
    let engine = loaded_engine(0, 1);

    group.bench_function("udf_projection", |b| {
        b.iter(|| black_box(engine.get(UDF_SCRIPT, DATABASE).unwrap()));
    });
    group.bench_function("window", |b| {
        b.iter(|| black_box(engine.get(WINDOW_SCRIPT, DATABASE).unwrap()));
    });

    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/run");

    for rows in [1000, 10_000].iter() {
        let engine = loaded_engine(*rows, 64);
        let projection = engine.get(UDF_SCRIPT, DATABASE).unwrap();
        let window = engine.get(WINDOW_SCRIPT, DATABASE).unwrap();

        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("udf_projection", rows), rows, |b, &n| {
            b.iter(|| {
                let mut output = Vec::with_capacity(n);
                black_box(projection.run(&mut output, n).unwrap())
            });
        });
        group.bench_with_input(BenchmarkId::new("window", rows), rows, |b, &n| {
            b.iter(|| {
                let mut output = Vec::with_capacity(n);
                black_box(window.run(&mut output, n).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_run);
criterion_main!(benches);
