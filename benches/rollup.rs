use criterion::{black_box, Criterion};
use std::env;
use std::time::Duration;
use waypoint_core::telemetry::rollup::{RollupProcessor, WORKLOAD_DURATION_MS};
use waypoint_core::telemetry::{LogsProcessor, TelemetryRecord};

/// Benchmarks one grouping+aggregation pass over a fixed batch of records
/// split across a handful of distinct label groups, the shape the rollup
/// stage sees on a real control point.
fn bench_rollup_batch(c: &mut Criterion) {
    let records: Vec<TelemetryRecord> = (0..1000)
        .map(|i| {
            TelemetryRecord::new()
                .with("service", format!("svc-{}", i % 8))
                .with(WORKLOAD_DURATION_MS, (i % 50).to_string())
        })
        .collect();

    c.bench_function("rollup_batch_1000", |b| {
        b.iter(|| {
            let processor = RollupProcessor::new(vec![WORKLOAD_DURATION_MS.to_string()]);
            let out = processor.consume_logs(black_box(records.clone())).unwrap();
            black_box(out)
        });
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_rollup_batch(&mut criterion);
    criterion.final_summary();
}
