//! Enrichment processor (C6): replaces the `entity_name` attribute on a
//! telemetry record with an `aperture.services` list looked up in the
//! entity cache (C2).
//!
//! Grounded in `pkg/otelcollector/enrichmentprocessor/processor.go`'s
//! `enrichMetrics`: on a cache hit the name attribute is removed and a
//! services list is inserted; on a miss the name attribute is still removed
//! and a trace-level log is the only trace of the failed lookup — the
//! record otherwise passes through unchanged.

use std::sync::Arc;

use crate::entity::EntityCache;
use crate::error::DataPlaneError;
use crate::observability::logging::{Logger, TracingLogger};
use crate::telemetry::{AttributeValue, LogsProcessor, ProcessorCapabilities, TelemetryRecord};

/// Input attribute the processor reads and always removes.
pub const ENTITY_NAME_KEY: &str = "entity_name";
/// Output attribute the processor writes on a cache hit.
pub const APERTURE_SERVICES_KEY: &str = "aperture.services";

pub struct EnrichmentProcessor {
    cache: Arc<EntityCache>,
    logger: Arc<dyn Logger>,
}

impl EnrichmentProcessor {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self::with_logger(cache, Arc::new(TracingLogger))
    }

    pub fn with_logger(cache: Arc<EntityCache>, logger: Arc<dyn Logger>) -> Self {
        Self { cache, logger }
    }

    fn enrich(&self, mut record: TelemetryRecord) -> TelemetryRecord {
        let Some(AttributeValue::Str(name)) = record.attributes.remove(ENTITY_NAME_KEY) else {
            return record;
        };
        match self.cache.get_by_name(&name) {
            Ok(entity) => {
                record.attributes.insert(
                    APERTURE_SERVICES_KEY.to_string(),
                    AttributeValue::StrList(entity.services),
                );
            }
            Err(_) => {
                self.logger.trace_with_fields(
                    "entity not found in cache, skipping enrichment",
                    &[],
                );
            }
        }
        record
    }
}

impl LogsProcessor for EnrichmentProcessor {
    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities { mutates_data: true }
    }

    fn start(&self) -> Result<(), DataPlaneError> {
        self.logger.debug("enrichment processor start");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), DataPlaneError> {
        self.logger.debug("enrichment processor shutdown");
        Ok(())
    }

    fn consume_logs(&self, records: Vec<TelemetryRecord>) -> Result<Vec<TelemetryRecord>, DataPlaneError> {
        Ok(records.into_iter().map(|r| self.enrich(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn cache_with_entity() -> Arc<EntityCache> {
        let cache = Arc::new(EntityCache::new());
        cache.put(
            Entity::new("u-1", "ns/")
                .with_ip_address("192.0.2.0")
                .with_name("test-entity")
                .with_services(vec!["svc1".into(), "svc2".into()]),
        );
        cache
    }

    #[test]
    fn hit_replaces_entity_name_with_services_list() {
        let processor = EnrichmentProcessor::new(cache_with_entity());
        let record = TelemetryRecord::new().with(ENTITY_NAME_KEY, "test-entity");
        let out = processor.consume_logs(vec![record]).unwrap();
        assert_eq!(out.len(), 1);
        assert!(!out[0].attributes.contains_key(ENTITY_NAME_KEY));
        assert_eq!(
            out[0].attributes[APERTURE_SERVICES_KEY],
            AttributeValue::StrList(vec!["svc1".into(), "svc2".into()])
        );
    }

    #[test]
    fn miss_still_removes_entity_name_but_adds_nothing() {
        let processor = EnrichmentProcessor::new(Arc::new(EntityCache::new()));
        let record = TelemetryRecord::new().with(ENTITY_NAME_KEY, "unknown");
        let out = processor.consume_logs(vec![record]).unwrap();
        assert!(!out[0].attributes.contains_key(ENTITY_NAME_KEY));
        assert!(!out[0].attributes.contains_key(APERTURE_SERVICES_KEY));
    }

    #[test]
    fn record_without_entity_name_passes_through_unchanged() {
        let processor = EnrichmentProcessor::new(cache_with_entity());
        let record = TelemetryRecord::new().with("other", "value");
        let out = processor.consume_logs(vec![record.clone()]).unwrap();
        assert_eq!(out[0], record);
    }

    #[test]
    fn capabilities_report_mutates_data() {
        let processor = EnrichmentProcessor::new(cache_with_entity());
        assert!(processor.capabilities().mutates_data);
    }
}
