//! Property-based checks of invariants that should hold for *every* input,
//! not just the hand-picked scenarios covered by unit tests.

use std::time::Duration;

use proptest::prelude::*;
use waypoint_core::policy::ema::EmaComponent;
use waypoint_core::policy::{Component, PortToValue, Reading, TickInfo};
use waypoint_core::telemetry::rollup::{
    aggregate_field, RollupProcessor, MAX_SUFFIX, MIN_SUFFIX, ROLLUP_COUNT_KEY, SUM_SUFFIX,
    WORKLOAD_DURATION_MS,
};
use waypoint_core::telemetry::{AttributeValue, LogsProcessor, TelemetryRecord};

fn tick(n: u64) -> TickInfo {
    TickInfo {
        tick: n,
        evaluation_interval: Duration::from_secs(1),
    }
}

fn single_input(value: f64) -> PortToValue {
    let mut ports = PortToValue::new();
    ports.insert("input".to_string(), vec![Reading::new(value)]);
    ports
}

proptest! {
    /// While still inside its warm-up window, the EMA component's output is
    /// always the running arithmetic mean of the valid inputs seen so far —
    /// no alpha blending happens until the stage transitions to EMA proper.
    #[test]
    fn warm_up_output_is_the_running_mean(values in prop::collection::vec(-1.0e6f64..1.0e6, 1..30)) {
        // Warm-up window far longer than the input sequence so every tick
        // in this test stays inside Stage::WarmUp.
        let mut ema = EmaComponent::new(
            Duration::from_secs(10_000),
            Duration::from_secs(5),
            Duration::from_secs(1),
            1.0,
            1.0,
        );

        let mut running_sum = 0.0;
        for (i, value) in values.iter().enumerate() {
            running_sum += value;
            let count = (i + 1) as f64;
            let result = ema.execute(single_input(*value), tick(i as u64 + 1)).unwrap();
            let output = result["output"][0];
            prop_assert!(output.valid());
            let expected = running_sum / count;
            prop_assert!((output.value() - expected).abs() < 1e-6 * expected.abs().max(1.0));
        }
    }

    /// An invalid reading always resets the running warm-up average: the
    /// next valid reading's output is exactly that reading's value, never
    /// blended with anything seen before the reset.
    #[test]
    fn invalid_reading_resets_warm_up_average(
        before in prop::collection::vec(-1.0e6f64..1.0e6, 1..10),
        after_value in -1.0e6f64..1.0e6,
    ) {
        let mut ema = EmaComponent::new(
            Duration::from_secs(10_000),
            Duration::from_secs(5),
            Duration::from_secs(1),
            1.0,
            1.0,
        );
        let mut t = 0u64;
        for value in &before {
            t += 1;
            ema.execute(single_input(*value), tick(t)).unwrap();
        }
        t += 1;
        let mut invalid_ports = PortToValue::new();
        invalid_ports.insert("input".to_string(), vec![Reading::invalid()]);
        let reset = ema.execute(invalid_ports, tick(t)).unwrap();
        prop_assert!(!reset["output"][0].valid());

        t += 1;
        let after = ema.execute(single_input(after_value), tick(t)).unwrap();
        prop_assert_eq!(after["output"][0], Reading::new(after_value));
    }

    /// For any sequence of numeric-parseable workload durations sharing one
    /// retained-attribute group, the rollup stage's emitted sum/min/max and
    /// count exactly match what a direct fold over the same values produces.
    #[test]
    fn rollup_aggregates_match_a_direct_fold(values in prop::collection::vec(-1.0e4f64..1.0e4, 1..40)) {
        let records: Vec<TelemetryRecord> = values
            .iter()
            .map(|v| {
                TelemetryRecord::new()
                    .with("group", "fixed")
                    .with(WORKLOAD_DURATION_MS, v.to_string())
            })
            .collect();

        let processor = RollupProcessor::new(vec![WORKLOAD_DURATION_MS.to_string()]);
        let out = processor.consume_logs(records).unwrap();
        prop_assert_eq!(out.len(), 1);
        let attrs = &out[0].attributes;

        let expected_sum: f64 = values.iter().sum();
        let expected_min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let expected_max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        prop_assert_eq!(attrs[ROLLUP_COUNT_KEY].clone(), AttributeValue::Int(values.len() as i64));

        let AttributeValue::Float(sum) = attrs[&aggregate_field(WORKLOAD_DURATION_MS, SUM_SUFFIX)] else {
            panic!("sum attribute missing or wrong type");
        };
        prop_assert!((sum - expected_sum).abs() < 1e-6 * expected_sum.abs().max(1.0));

        prop_assert_eq!(
            attrs[&aggregate_field(WORKLOAD_DURATION_MS, MIN_SUFFIX)].clone(),
            AttributeValue::Float(expected_min)
        );
        prop_assert_eq!(
            attrs[&aggregate_field(WORKLOAD_DURATION_MS, MAX_SUFFIX)].clone(),
            AttributeValue::Float(expected_max)
        );
    }
}
