//! Composition root: builds one instance of every component and owns their
//! start/shutdown order.
//!
//! No component here reaches for a process-wide singleton — [`observability`]
//! interfaces and the shared [`EntityCache`] are constructed once and handed
//! down as `Arc`s, the same injection style `host::HostLifecycle`'s
//! `ComponentFactory` uses upstream, scoped down to the eight components this
//! crate actually has.

use std::sync::Arc;

use crate::engine::FlowEngine;
use crate::entity::EntityCache;
use crate::error::DataPlaneError;
use crate::observability::logging::{Logger, TracingLogger};
use crate::observability::metrics::{MetricsProvider, NoopMetrics};
use crate::telemetry::enrichment::EnrichmentProcessor;
use crate::telemetry::metrics_processor::MetricsProcessor;
use crate::telemetry::rollup::{RollupProcessor, WORKLOAD_DURATION_MS};
use crate::telemetry::LogsProcessor;

/// Host-provided interfaces the data plane is built against. Defaults to the
/// crate's own [`TracingLogger`] and [`NoopMetrics`]; a real deployment
/// supplies its own bridges.
pub struct Interfaces {
    pub logger: Arc<dyn Logger>,
    pub metrics: Arc<dyn MetricsProvider>,
}

impl Default for Interfaces {
    fn default() -> Self {
        Self {
            logger: Arc::new(TracingLogger),
            metrics: Arc::new(NoopMetrics),
        }
    }
}

/// One running instance of the data plane: the shared state (C2, C3, C4 live
/// inside C3's registries) plus the telemetry pipeline stages (C5, C6, C8) in
/// the order they run.
pub struct DataPlane {
    interfaces: Interfaces,
    pub entity_cache: Arc<EntityCache>,
    pub flow_engine: Arc<FlowEngine>,
    metrics_processor: Arc<MetricsProcessor>,
    pipeline: Vec<Arc<dyn LogsProcessor>>,
    started: bool,
}

impl DataPlane {
    /// Builds the telemetry pipeline in its fixed run order: enrichment
    /// (C6) fills in `aperture.services` before rollup (C5) groups by
    /// retained attributes, and the metrics join (C8) runs last so it counts
    /// decisions against the fully enriched, rolled-up record.
    pub fn new(interfaces: Interfaces, rollup_source_fields: Vec<String>) -> Self {
        let entity_cache = Arc::new(EntityCache::new());
        let flow_engine = Arc::new(FlowEngine::new());

        let enrichment = Arc::new(EnrichmentProcessor::with_logger(
            entity_cache.clone(),
            interfaces.logger.clone(),
        ));
        let rollup = Arc::new(RollupProcessor::with_metrics(
            rollup_source_fields,
            interfaces.metrics.clone(),
        ));
        let metrics_processor = Arc::new(MetricsProcessor::new(interfaces.metrics.clone()));

        let pipeline: Vec<Arc<dyn LogsProcessor>> =
            vec![enrichment, rollup, metrics_processor.clone()];

        Self {
            interfaces,
            entity_cache,
            flow_engine,
            metrics_processor,
            pipeline,
            started: false,
        }
    }

    /// Convenience constructor matching the rollup processor's upstream
    /// default source field (`workload_duration_ms`).
    pub fn with_default_rollup_fields(interfaces: Interfaces) -> Self {
        Self::new(interfaces, vec![WORKLOAD_DURATION_MS.to_string()])
    }

    pub fn interfaces(&self) -> &Interfaces {
        &self.interfaces
    }

    /// The metrics-join stage (C8), kept as its own handle so callers can
    /// record a decision directly via [`MetricsProcessor::record_decision`]
    /// without needing to downcast it back out of the generic pipeline.
    pub fn metrics_processor(&self) -> &Arc<MetricsProcessor> {
        &self.metrics_processor
    }

    /// Starts every pipeline stage in order. If a later stage fails to
    /// start, every stage started before it is shut down in reverse order
    /// before the error is returned — no stage is left running after a
    /// failed `start`.
    pub fn start(&mut self) -> Result<(), DataPlaneError> {
        if self.started {
            return Ok(());
        }
        for (index, stage) in self.pipeline.iter().enumerate() {
            if let Err(err) = stage.start() {
                self.interfaces.logger.error(
                    "pipeline stage failed to start, unwinding prior stages",
                    Some(&err),
                );
                for prior in self.pipeline[..index].iter().rev() {
                    let _ = prior.shutdown();
                }
                return Err(err);
            }
        }
        self.started = true;
        Ok(())
    }

    /// Shuts every stage down in reverse start order. Every stage's
    /// `shutdown` is attempted even if an earlier one fails; the first
    /// error encountered is returned after all have been attempted.
    pub fn shutdown(&mut self) -> Result<(), DataPlaneError> {
        if !self.started {
            return Ok(());
        }
        let mut first_err = None;
        for stage in self.pipeline.iter().rev() {
            if let Err(err) = stage.shutdown() {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        self.started = false;
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs one batch of records through the telemetry pipeline stages in
    /// order, each stage's output feeding the next.
    pub fn consume_logs(
        &self,
        mut records: Vec<crate::telemetry::TelemetryRecord>,
    ) -> Result<Vec<crate::telemetry::TelemetryRecord>, DataPlaneError> {
        for stage in &self.pipeline {
            records = stage.consume_logs(records)?;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::enrichment::{APERTURE_SERVICES_KEY, ENTITY_NAME_KEY};
    use crate::telemetry::rollup::ROLLUP_COUNT_KEY;
    use crate::telemetry::TelemetryRecord;
    use crate::entity::Entity;

    #[test]
    fn start_then_shutdown_is_idempotent() {
        let mut plane = DataPlane::with_default_rollup_fields(Interfaces::default());
        plane.start().unwrap();
        plane.start().unwrap();
        plane.shutdown().unwrap();
        plane.shutdown().unwrap();
    }

    #[test]
    fn consume_logs_runs_enrichment_before_rollup() {
        let plane = DataPlane::with_default_rollup_fields(Interfaces::default());
        plane
            .entity_cache
            .put(Entity::new("u-1", "ns/").with_name("svc-a").with_services(vec!["x".into()]));

        let record = TelemetryRecord::new()
            .with(ENTITY_NAME_KEY, "svc-a")
            .with(WORKLOAD_DURATION_MS, "5");
        let out = plane.consume_logs(vec![record]).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].attributes.contains_key(APERTURE_SERVICES_KEY));
        assert!(out[0].attributes.contains_key(ROLLUP_COUNT_KEY));
    }
}
