//! Label matching: evaluate a request's labels against a set of installed
//! selectors and return the ordered set of matching limiter identities.
//!
//! `Selector` mirrors the upstream proto shape (`Selector` composed of a
//! `ServiceSelector`, a `ControlPoint` and a `FlowSelector` of label matchers),
//! as seen in `selector_deepcopy.gen.go`. `LimiterId` mirrors `ClassifierID`
//! from `pkg/policies/dataplane/iface/classifier.go`, including its ordering:
//! limiter ids sort by `(policy_name, policy_hash, index)` so denial lists are
//! deterministic across runs.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

use crate::error::DataPlaneError;

/// `(policy_name, policy_hash, index)` triple identifying one registered
/// classifier / rate limiter / concurrency limiter / flux meter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LimiterId {
    pub policy_name: String,
    pub policy_hash: String,
    pub index: i64,
}

impl LimiterId {
    pub fn new(policy_name: impl Into<String>, policy_hash: impl Into<String>, index: i64) -> Self {
        Self {
            policy_name: policy_name.into(),
            policy_hash: policy_hash.into(),
            index,
        }
    }
}

impl std::fmt::Display for LimiterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "policy_name-{}-policy_hash-{}-{}",
            self.policy_name, self.policy_hash, self.index
        )
    }
}

impl PartialOrd for LimiterId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LimiterId {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.policy_name, &self.policy_hash, self.index).cmp(&(
            &other.policy_name,
            &other.policy_hash,
            other.index,
        ))
    }
}

/// A single label-matching predicate.
#[derive(Debug)]
pub enum LabelMatcher {
    /// The label must be present with exactly this value.
    Equals { key: String, value: String },
    /// The label must be present, any value.
    Present { key: String },
    /// The label must be present and match the compiled regex.
    Regex { key: String, pattern: Regex },
}

impl LabelMatcher {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn present(key: impl Into<String>) -> Self {
        Self::Present { key: key.into() }
    }

    /// Compiles `pattern` eagerly so a malformed regex is rejected at
    /// registration time rather than surfacing as a match-time failure.
    pub fn regex(key: impl Into<String>, pattern: &str) -> Result<Self, DataPlaneError> {
        let compiled = Regex::new(pattern)
            .map_err(|e| DataPlaneError::config_invalid("label_matcher.regex", e.to_string()))?;
        Ok(Self::Regex {
            key: key.into(),
            pattern: compiled,
        })
    }

    fn matches(&self, labels: &HashMap<String, String>) -> bool {
        match self {
            LabelMatcher::Equals { key, value } => labels.get(key).is_some_and(|v| v == value),
            LabelMatcher::Present { key } => labels.contains_key(key),
            LabelMatcher::Regex { key, pattern } => {
                labels.get(key).is_some_and(|v| pattern.is_match(v))
            }
        }
    }
}

/// Restricts a selector to a subset of service identities and control points,
/// mirroring `ServiceSelector` + `ControlPoint` from the original proto model.
#[derive(Debug, Default)]
pub struct Selector {
    /// `None` matches any agent group.
    pub agent_group: Option<String>,
    /// `None` matches any service id.
    pub service: Option<String>,
    /// `None` matches any control point.
    pub control_point: Option<String>,
    pub label_matchers: Vec<LabelMatcher>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control_point(mut self, control_point: impl Into<String>) -> Self {
        self.control_point = Some(control_point.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_matcher(mut self, matcher: LabelMatcher) -> Self {
        self.label_matchers.push(matcher);
        self
    }

    fn matches_control_point(&self, control_point: &str) -> bool {
        self.control_point
            .as_deref()
            .is_none_or(|cp| cp == control_point)
    }

    fn matches_service(&self, service_ids: &[String]) -> bool {
        match &self.service {
            None => true,
            Some(wanted) => service_ids.iter().any(|s| s == wanted),
        }
    }

    fn matches_labels(&self, labels: &HashMap<String, String>) -> bool {
        self.label_matchers.iter().all(|m| m.matches(labels))
    }

    pub fn matches(
        &self,
        control_point: &str,
        service_ids: &[String],
        labels: &HashMap<String, String>,
    ) -> bool {
        self.matches_control_point(control_point)
            && self.matches_service(service_ids)
            && self.matches_labels(labels)
    }
}

/// A registered (id, selector) pair, owned by an indexed registry of a given
/// kind (classifiers, rate limiters, concurrency limiters, flux meters).
struct Entry {
    id: LimiterId,
    selector: Selector,
}

/// Indexed collection of selectors of one kind. Backed by a single `RwLock`
/// rather than a sharded map: registration/unregistration is rare compared to
/// matching, and every match call needs a consistent snapshot across all
/// entries (readers must never observe a selector mid-registration).
#[derive(Default)]
pub struct SelectorIndex {
    entries: RwLock<Vec<Entry>>,
}

impl SelectorIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers `selector` under `id`. Rejects a duplicate id with
    /// `ConfigInvalid` rather than silently shadowing the previous selector.
    pub fn register(&self, id: LimiterId, selector: Selector) -> Result<(), DataPlaneError> {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if guard.iter().any(|e| e.id == id) {
            return Err(DataPlaneError::config_invalid(
                "selector.duplicate_id",
                format!("limiter id already registered: {id}"),
            ));
        }
        guard.push(Entry { id, selector });
        Ok(())
    }

    pub fn unregister(&self, id: &LimiterId) -> bool {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|e| &e.id != id);
        guard.len() != before
    }

    pub fn contains(&self, id: &LimiterId) -> bool {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.iter().any(|e| &e.id == id)
    }

    /// Returns the ids of every registered selector matching `control_point`,
    /// `service_ids` and `labels`, sorted by [`LimiterId`] ordering so results
    /// are deterministic regardless of registration order.
    pub fn matching(
        &self,
        control_point: &str,
        service_ids: &[String],
        labels: &HashMap<String, String>,
    ) -> Vec<LimiterId> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<LimiterId> = guard
            .iter()
            .filter(|e| e.selector.matches(control_point, service_ids, labels))
            .map(|e| e.id.clone())
            .collect();
        matched.sort();
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn equals_matcher_requires_exact_value() {
        let m = LabelMatcher::equals("env", "prod");
        assert!(m.matches(&labels(&[("env", "prod")])));
        assert!(!m.matches(&labels(&[("env", "staging")])));
        assert!(!m.matches(&labels(&[])));
    }

    #[test]
    fn regex_matcher_rejects_bad_pattern_at_construction() {
        assert!(LabelMatcher::regex("path", "(unterminated").is_err());
    }

    #[test]
    fn regex_matcher_matches_value() {
        let m = LabelMatcher::regex("path", "^/api/.*$").unwrap();
        assert!(m.matches(&labels(&[("path", "/api/v1/x")])));
        assert!(!m.matches(&labels(&[("path", "/health")])));
    }

    #[test]
    fn matching_returns_sorted_limiter_ids() {
        let index = SelectorIndex::new();
        index
            .register(
                LimiterId::new("policy-b", "hash", 0),
                Selector::new().with_control_point("ingress"),
            )
            .unwrap();
        index
            .register(
                LimiterId::new("policy-a", "hash", 0),
                Selector::new().with_control_point("ingress"),
            )
            .unwrap();

        let matched = index.matching("ingress", &[], &HashMap::new());
        assert_eq!(matched[0].policy_name, "policy-a");
        assert_eq!(matched[1].policy_name, "policy-b");
    }

    #[test]
    fn duplicate_registration_is_config_invalid() {
        let index = SelectorIndex::new();
        let id = LimiterId::new("p", "h", 0);
        index.register(id.clone(), Selector::new()).unwrap();
        assert!(matches!(
            index.register(id, Selector::new()),
            Err(DataPlaneError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn service_selector_restricts_to_named_services() {
        let selector = Selector::new().with_service("checkout");
        let mut labels_map = HashMap::new();
        labels_map.insert("k".to_string(), "v".to_string());
        assert!(selector.matches("cp", &["checkout".to_string()], &labels_map));
        assert!(!selector.matches("cp", &["other".to_string()], &labels_map));
    }
}
