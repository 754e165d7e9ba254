//! Flow engine (C3): the per-request admission pipeline. Grounds
//! `pkg/policies/dataplane/iface/engine.go`'s `Engine` interface — registries
//! of classifiers/concurrency limiters/flux meters/rate limiters, and a
//! `ProcessRequest` entry point that matches, classifies and admits.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Instant;

use crate::error::DataPlaneError;
use crate::limiter::{ConcurrencyGuard, ConcurrencyLimiter, RateLimiter};
use crate::selector::{LimiterId, Selector, SelectorIndex};

/// Outcome of [`FlowEngine::process_request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected(RejectReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    RateLimited,
    ConcurrencyLimited,
    DeadlineExceeded,
}

/// Full structured result of a request check: the decision plus every
/// limiter/classifier/meter id consulted while reaching it.
///
/// On acceptance, every concurrency slot acquired while reaching that
/// decision is held inside this response rather than released immediately —
/// the slot is credited back at response time, when the caller is done with
/// the request and drops (or explicitly releases) this value. This is what
/// makes the concurrency limiter actually bound *in-flight* requests rather
/// than just the instant of admission; see the at-most-one-acceptance
/// invariant this component is tested against.
#[derive(Debug)]
pub struct CheckResponse {
    pub decision: Decision,
    pub classifier_ids: Vec<LimiterId>,
    pub flux_meter_ids: Vec<LimiterId>,
    pub rate_limiter_ids: Vec<LimiterId>,
    pub concurrency_limiter_ids: Vec<LimiterId>,
    pub(crate) concurrency_guards: Vec<ConcurrencyGuard>,
}

impl CheckResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self.decision, Decision::Accepted)
    }

    /// Releases every concurrency slot this response is holding. Equivalent
    /// to dropping the response, spelled out for call sites that want to
    /// mark the release point explicitly (e.g. "request finished, crediting
    /// its concurrency slots back now").
    pub fn release(self) {
        drop(self);
    }
}

/// Internal registry pairing a selector with the limiter object it guards.
/// Matching and storage share one lock: a reader of `matching` must never see
/// an id whose backing object hasn't been inserted yet.
struct LimiterRegistry<T> {
    entries: RwLock<HashMap<LimiterId, (Selector, Arc<T>)>>,
}

impl<T> Default for LimiterRegistry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> LimiterRegistry<T> {
    fn register(
        &self,
        id: LimiterId,
        selector: Selector,
        limiter: Arc<T>,
    ) -> Result<(), DataPlaneError> {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(&id) {
            return Err(DataPlaneError::config_invalid(
                "engine.duplicate_limiter_id",
                format!("limiter id already registered: {id}"),
            ));
        }
        guard.insert(id, (selector, limiter));
        Ok(())
    }

    fn unregister(&self, id: &LimiterId) -> bool {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(id).is_some()
    }

    fn get(&self, id: &LimiterId) -> Option<Arc<T>> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.get(id).map(|(_, limiter)| limiter.clone())
    }

    /// Ids and objects whose selector matches, sorted by [`LimiterId`].
    fn matching(
        &self,
        control_point: &str,
        service_ids: &[String],
        labels: &HashMap<String, String>,
    ) -> Vec<(LimiterId, Arc<T>)> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<(LimiterId, Arc<T>)> = guard
            .iter()
            .filter(|(_, (selector, _))| selector.matches(control_point, service_ids, labels))
            .map(|(id, (_, limiter))| (id.clone(), limiter.clone()))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched
    }
}

/// Request-time admission pipeline: registries of classifiers, flux meters,
/// rate limiters and concurrency limiters, plus the `process_request`
/// algorithm described in the design notes for this component.
#[derive(Default)]
pub struct FlowEngine {
    classifiers: SelectorIndex,
    flux_meters: SelectorIndex,
    rate_limiters: LimiterRegistry<RateLimiter>,
    concurrency_limiters: LimiterRegistry<ConcurrencyLimiter>,
}

impl FlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_classifier(&self, id: LimiterId, selector: Selector) -> Result<(), DataPlaneError> {
        self.classifiers.register(id, selector)
    }

    pub fn unregister_classifier(&self, id: &LimiterId) -> bool {
        self.classifiers.unregister(id)
    }

    pub fn register_flux_meter(&self, id: LimiterId, selector: Selector) -> Result<(), DataPlaneError> {
        self.flux_meters.register(id, selector)
    }

    pub fn unregister_flux_meter(&self, id: &LimiterId) -> bool {
        self.flux_meters.unregister(id)
    }

    pub fn register_rate_limiter(
        &self,
        id: LimiterId,
        selector: Selector,
        limiter: Arc<RateLimiter>,
    ) -> Result<(), DataPlaneError> {
        self.rate_limiters.register(id, selector, limiter)
    }

    pub fn unregister_rate_limiter(&self, id: &LimiterId) -> bool {
        self.rate_limiters.unregister(id)
    }

    pub fn get_rate_limiter(&self, id: &LimiterId) -> Option<Arc<RateLimiter>> {
        self.rate_limiters.get(id)
    }

    pub fn register_concurrency_limiter(
        &self,
        id: LimiterId,
        selector: Selector,
        limiter: Arc<ConcurrencyLimiter>,
    ) -> Result<(), DataPlaneError> {
        self.concurrency_limiters.register(id, selector, limiter)
    }

    pub fn unregister_concurrency_limiter(&self, id: &LimiterId) -> bool {
        self.concurrency_limiters.unregister(id)
    }

    pub fn get_concurrency_limiter(&self, id: &LimiterId) -> Option<Arc<ConcurrencyLimiter>> {
        self.concurrency_limiters.get(id)
    }

    /// Runs one request through matching, rate limiting and concurrency
    /// limiting. See the component design notes for the full five-step
    /// algorithm; concurrency slots acquired before a later denial are
    /// released before returning so no permit is ever leaked on a reject
    /// path.
    pub fn process_request(
        &self,
        control_point: &str,
        service_ids: &[String],
        labels: &HashMap<String, String>,
        deadline: Option<Instant>,
    ) -> CheckResponse {
        let classifier_ids = self.classifiers.matching(control_point, service_ids, labels);
        let flux_meter_ids = self.flux_meters.matching(control_point, service_ids, labels);
        let matched_rate_limiters = self.rate_limiters.matching(control_point, service_ids, labels);
        let matched_concurrency_limiters =
            self.concurrency_limiters.matching(control_point, service_ids, labels);

        let rate_limiter_ids: Vec<LimiterId> =
            matched_rate_limiters.iter().map(|(id, _)| id.clone()).collect();
        let concurrency_limiter_ids: Vec<LimiterId> = matched_concurrency_limiters
            .iter()
            .map(|(id, _)| id.clone())
            .collect();

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return CheckResponse {
                    decision: Decision::Rejected(RejectReason::DeadlineExceeded),
                    classifier_ids,
                    flux_meter_ids,
                    rate_limiter_ids,
                    concurrency_limiter_ids,
                    concurrency_guards: Vec::new(),
                };
            }
        }

        let mut rate_limited = false;
        for (_, limiter) in &matched_rate_limiters {
            if !limiter.try_acquire() {
                rate_limited = true;
            }
        }
        if rate_limited {
            return CheckResponse {
                decision: Decision::Rejected(RejectReason::RateLimited),
                classifier_ids,
                flux_meter_ids,
                rate_limiter_ids,
                concurrency_limiter_ids,
                concurrency_guards: Vec::new(),
            };
        }

        let mut acquired_guards = Vec::with_capacity(matched_concurrency_limiters.len());
        let mut concurrency_limited = false;
        for (_, limiter) in &matched_concurrency_limiters {
            match limiter.try_acquire() {
                Some(guard) => acquired_guards.push(guard),
                None => {
                    concurrency_limited = true;
                    break;
                }
            }
        }
        if concurrency_limited {
            // Dropping `acquired_guards` here releases every slot taken in
            // this call before we return, so a partial acquisition never
            // leaks a permit.
            drop(acquired_guards);
            return CheckResponse {
                decision: Decision::Rejected(RejectReason::ConcurrencyLimited),
                classifier_ids,
                flux_meter_ids,
                rate_limiter_ids,
                concurrency_limiter_ids,
                concurrency_guards: Vec::new(),
            };
        }

        // Accepted: every acquired slot travels with the response rather
        // than being released here, so it stays occupied for as long as the
        // caller holds the response — i.e. for the lifetime of the request,
        // not just the instant of admission.
        CheckResponse {
            decision: Decision::Accepted,
            classifier_ids,
            flux_meter_ids,
            rate_limiter_ids,
            concurrency_limiter_ids,
            concurrency_guards: acquired_guards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn accepts_when_no_limiters_registered() {
        let engine = FlowEngine::new();
        let resp = engine.process_request("ingress", &[], &labels(), None);
        assert_eq!(resp.decision, Decision::Accepted);
    }

    #[test]
    fn rejects_with_rate_limited_when_bucket_exhausted() {
        let engine = FlowEngine::new();
        engine
            .register_rate_limiter(
                LimiterId::new("p", "h", 0),
                Selector::new(),
                Arc::new(RateLimiter::new(0.0, 0.0)),
            )
            .unwrap();
        let resp = engine.process_request("ingress", &[], &labels(), None);
        assert_eq!(resp.decision, Decision::Rejected(RejectReason::RateLimited));
        assert_eq!(resp.rate_limiter_ids.len(), 1);
    }

    #[test]
    fn accepted_response_holds_concurrency_slot_until_dropped() {
        let engine = FlowEngine::new();
        let limiter = Arc::new(ConcurrencyLimiter::new(1));
        engine
            .register_concurrency_limiter(LimiterId::new("a", "h", 0), Selector::new(), limiter.clone())
            .unwrap();

        let first = engine.process_request("ingress", &[], &labels(), None);
        assert!(first.is_accepted());
        assert_eq!(limiter.in_flight(), 1);

        // A second request races for the same single slot while the first
        // response is still alive: it must be rejected, not just matched.
        let second = engine.process_request("ingress", &[], &labels(), None);
        assert_eq!(
            second.decision,
            Decision::Rejected(RejectReason::ConcurrencyLimited)
        );

        drop(first);
        assert_eq!(limiter.in_flight(), 0);

        let third = engine.process_request("ingress", &[], &labels(), None);
        assert!(third.is_accepted());
    }

    #[test]
    fn rejects_with_concurrency_limited_and_releases_slots_on_partial_denial() {
        let engine = FlowEngine::new();
        let full = Arc::new(ConcurrencyLimiter::new(1));
        let _held = full.try_acquire().unwrap();
        engine
            .register_concurrency_limiter(LimiterId::new("a", "h", 0), Selector::new(), Arc::new(ConcurrencyLimiter::new(5)))
            .unwrap();
        engine
            .register_concurrency_limiter(LimiterId::new("b", "h", 0), Selector::new(), full.clone())
            .unwrap();

        let resp = engine.process_request("ingress", &[], &labels(), None);
        assert_eq!(
            resp.decision,
            Decision::Rejected(RejectReason::ConcurrencyLimited)
        );

        let a_limiter = engine
            .get_concurrency_limiter(&LimiterId::new("a", "h", 0))
            .unwrap();
        assert_eq!(a_limiter.in_flight(), 0);
    }

    #[test]
    fn deadline_in_the_past_rejects_before_consuming_limiters() {
        let engine = FlowEngine::new();
        let limiter = Arc::new(RateLimiter::new(0.0, 1.0));
        engine
            .register_rate_limiter(LimiterId::new("p", "h", 0), Selector::new(), limiter.clone())
            .unwrap();
        let past = Instant::now() - std::time::Duration::from_secs(1);
        let resp = engine.process_request("ingress", &[], &labels(), Some(past));
        assert_eq!(
            resp.decision,
            Decision::Rejected(RejectReason::DeadlineExceeded)
        );
        // Token was never consumed because the deadline check runs first.
        assert!(limiter.try_acquire());
    }

    #[test]
    fn duplicate_rate_limiter_registration_rejected() {
        let engine = FlowEngine::new();
        let id = LimiterId::new("p", "h", 0);
        engine
            .register_rate_limiter(id.clone(), Selector::new(), Arc::new(RateLimiter::new(1.0, 1.0)))
            .unwrap();
        assert!(
            engine
                .register_rate_limiter(id, Selector::new(), Arc::new(RateLimiter::new(1.0, 1.0)))
                .is_err()
        );
    }
}
