//! Entity cache: concurrent index from network identity (IP, name) to an
//! enriched entity, driven by a prefix-notifier event stream.
//!
//! Grounded directly in `pkg/entitycache/entity_cache.go`'s `sync.RWMutex`
//! dual-index design: a writer takes the exclusive lock and updates both
//! indices atomically; readers take the shared lock and hand back a deep copy
//! so callers can never observe (or corrupt) cache-internal state.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::DataPlaneError;
use crate::notifier::{EventKind, NotifierEvent, PrefixNotifiee, Unmarshaller};

/// A network-identity-bearing workload entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub uid: String,
    pub prefix: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub services: Vec<String>,
}

impl Entity {
    pub fn new(uid: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            prefix: prefix.into(),
            ip_address: String::new(),
            name: String::new(),
            services: Vec::new(),
        }
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }
}

#[derive(Default)]
struct Indices {
    by_ip: HashMap<String, Entity>,
    by_name: HashMap<String, Entity>,
}

/// Concurrent cache mapping IP address and name to the entity that currently
/// owns them. Many readers may look up entities concurrently; writers take an
/// exclusive lock across both indices so a reader never observes a torn
/// update (entity present under one index but not the other).
pub struct EntityCache {
    indices: RwLock<Indices>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(Indices::default()),
        }
    }

    /// Maps the entity's non-empty IP address and/or name to itself,
    /// overwriting any prior occupant of those keys. Atomic across both
    /// indices.
    pub fn put(&self, entity: Entity) {
        let mut guard = self.indices.write().unwrap_or_else(|e| e.into_inner());
        if !entity.ip_address.is_empty() {
            guard.by_ip.insert(entity.ip_address.clone(), entity.clone());
        }
        if !entity.name.is_empty() {
            guard.by_name.insert(entity.name.clone(), entity.clone());
        }
    }

    /// Returns a deep copy of the entity registered under `ip`, or `NotFound`.
    pub fn get_by_ip(&self, ip: &str) -> Result<Entity, DataPlaneError> {
        let guard = self.indices.read().unwrap_or_else(|e| e.into_inner());
        guard
            .by_ip
            .get(ip)
            .cloned()
            .ok_or_else(|| DataPlaneError::not_found(format!("entity by ip {ip}")))
    }

    /// Returns a deep copy of the entity registered under `name`, or `NotFound`.
    pub fn get_by_name(&self, name: &str) -> Result<Entity, DataPlaneError> {
        let guard = self.indices.read().unwrap_or_else(|e| e.into_inner());
        guard
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| DataPlaneError::not_found(format!("entity by name {name}")))
    }

    /// Removes both index entries for `entity`. Returns `true` if at least one
    /// of the IP or name mapping existed.
    pub fn remove(&self, entity: &Entity) -> bool {
        let mut guard = self.indices.write().unwrap_or_else(|e| e.into_inner());
        let removed_by_ip = guard.by_ip.remove(&entity.ip_address).is_some();
        let removed_by_name = guard.by_name.remove(&entity.name).is_some();
        removed_by_ip || removed_by_name
    }

    /// Atomically replaces both indices with empty ones.
    ///
    /// The upstream Go implementation takes only a read (shared) lock here
    /// while swapping the underlying maps out from under concurrent readers —
    /// a latent data race. This rewrite takes the writer lock, the same one
    /// `put`/`remove` use, so `clear` is mutually exclusive with every other
    /// mutation and with in-flight reads.
    pub fn clear(&self) {
        let mut guard = self.indices.write().unwrap_or_else(|e| e.into_inner());
        guard.by_ip.clear();
        guard.by_name.clear();
    }

    /// Deep copy of every entity currently indexed by IP, keyed by IP.
    pub fn snapshot_by_ip(&self) -> HashMap<String, Entity> {
        let guard = self.indices.read().unwrap_or_else(|e| e.into_inner());
        guard.by_ip.clone()
    }

    /// Deep copy of every entity currently indexed by name, keyed by name.
    pub fn snapshot_by_name(&self) -> HashMap<String, Entity> {
        let guard = self.indices.read().unwrap_or_else(|e| e.into_inner());
        guard.by_name.clone()
    }
}

impl PrefixNotifiee for EntityCache {
    /// Decode a single entity payload and apply it, mirroring
    /// `EntityCache.processUpdate`: `Write` -> `put`, `Remove` -> `remove`.
    /// A decode failure is logged and dropped; it never poisons the cache or
    /// the rest of the notifier stream.
    fn apply_event<U: Unmarshaller>(&self, event: NotifierEvent, unmarshaller: &U) {
        trace!(key = %event.key, kind = ?event.kind, "entity cache notifier event");
        let entity: Entity = match unmarshaller.unmarshal(&event.bytes) {
            Ok(entity) => entity,
            Err(err) => {
                tracing::error!(error = %err, key = %event.key, "failed to unmarshal entity payload");
                return;
            }
        };
        match event.kind {
            EventKind::Write => self.put(entity),
            EventKind::Remove => {
                self.remove(&entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::JsonUnmarshaller;

    fn sample() -> Entity {
        Entity::new("u-1", "ns/")
            .with_ip_address("192.0.2.0")
            .with_name("test-entity")
            .with_services(vec!["svc1".into(), "svc2".into()])
    }

    #[test]
    fn put_then_get_by_ip_and_name_agree() {
        let cache = EntityCache::new();
        cache.put(sample());
        let by_ip = cache.get_by_ip("192.0.2.0").unwrap();
        let by_name = cache.get_by_name("test-entity").unwrap();
        assert_eq!(by_ip, sample());
        assert_eq!(by_name, sample());
    }

    #[test]
    fn remove_clears_both_indices() {
        let cache = EntityCache::new();
        cache.put(sample());
        assert!(cache.remove(&sample()));
        assert!(cache.get_by_ip("192.0.2.0").is_err());
        assert!(cache.get_by_name("test-entity").is_err());
    }

    #[test]
    fn remove_of_unknown_entity_returns_false() {
        let cache = EntityCache::new();
        assert!(!cache.remove(&sample()));
    }

    #[test]
    fn clear_empties_both_indices_under_writer_lock() {
        let cache = EntityCache::new();
        cache.put(sample());
        cache.clear();
        assert!(cache.snapshot_by_ip().is_empty());
        assert!(cache.snapshot_by_name().is_empty());
    }

    #[test]
    fn put_overwrites_prior_occupant_of_same_keys() {
        let cache = EntityCache::new();
        cache.put(sample());
        let replacement = Entity::new("u-2", "ns/")
            .with_ip_address("192.0.2.0")
            .with_name("test-entity")
            .with_services(vec!["svc3".into()]);
        cache.put(replacement.clone());
        assert_eq!(cache.get_by_ip("192.0.2.0").unwrap(), replacement);
    }

    #[test]
    fn notifier_write_then_remove_round_trips() {
        let cache = EntityCache::new();
        let payload = serde_json::to_vec(&sample()).unwrap();
        cache.apply_event(NotifierEvent::write("entities/u-1", payload.clone()), &JsonUnmarshaller);
        assert_eq!(cache.get_by_name("test-entity").unwrap(), sample());

        cache.apply_event(NotifierEvent::remove("entities/u-1", payload), &JsonUnmarshaller);
        assert!(cache.get_by_name("test-entity").is_err());
    }
}
