//! Asserts the default [`TracingLogger`] bridge actually reaches the
//! `tracing` subscriber, rather than only checking it against the `Logger`
//! trait in isolation.

use std::sync::Arc;

use tracing_test::traced_test;
use waypoint_core::entity::EntityCache;
use waypoint_core::observability::logging::TracingLogger;
use waypoint_core::telemetry::enrichment::{EnrichmentProcessor, ENTITY_NAME_KEY};
use waypoint_core::telemetry::{LogsProcessor, TelemetryRecord};

#[traced_test]
#[test]
fn enrichment_miss_emits_a_trace_event_through_tracing_logger() {
    let processor =
        EnrichmentProcessor::with_logger(Arc::new(EntityCache::new()), Arc::new(TracingLogger));
    let record = TelemetryRecord::new().with(ENTITY_NAME_KEY, "nobody-home");
    processor.consume_logs(vec![record]).unwrap();

    assert!(logs_contain("entity not found in cache"));
}
