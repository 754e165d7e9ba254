//! Prefix-notifier ingestion: the single external write path into the data plane.
//!
//! Configuration arrives as a stream of `{Write, Remove}` events scoped to a key
//! prefix, each carrying an opaque byte payload. A pluggable [`Unmarshaller`]
//! decodes the payload into a typed value; callers never see undecoded bytes.
//! This mirrors the upstream prefix-notifier / unmarshal-notify pairing, just
//! without the `fx` lifecycle container — the composition root wires trackers
//! to components directly (see [`crate::composition`]).

use crate::error::DataPlaneError;
use serde::de::DeserializeOwned;

/// Kind of mutation a [`NotifierEvent`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Write,
    Remove,
}

/// A single prefix-scoped configuration event.
#[derive(Clone, Debug)]
pub struct NotifierEvent {
    pub kind: EventKind,
    pub key: String,
    pub bytes: Vec<u8>,
}

impl NotifierEvent {
    pub fn write(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind: EventKind::Write,
            key: key.into(),
            bytes,
        }
    }

    /// A `Remove` event still carries the last-known payload, mirroring the
    /// upstream notifier: the unmarshaller runs the same way for `Write` and
    /// `Remove`, it's the event kind that decides whether the decoded value
    /// is applied as a put or a removal key.
    pub fn remove(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind: EventKind::Remove,
            key: key.into(),
            bytes,
        }
    }
}

/// Decodes the opaque payload of a [`NotifierEvent`] into a typed configuration
/// value. Kept generic over the target type rather than tied to one wire format,
/// mirroring the upstream `config.Unmarshaller` seam — JSON is the default and
/// only implementation shipped here, since that's the one format the rest of
/// this crate's tests and examples exercise.
///
/// `unmarshal` is generic, so this trait is not object-safe — callers take
/// `&impl Unmarshaller` (see [`PrefixNotifiee::apply_event`]), never
/// `&dyn Unmarshaller`.
pub trait Unmarshaller: Send + Sync {
    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DataPlaneError>;
}

/// JSON-backed [`Unmarshaller`]. Decode failures are always `Transient`, never
/// `Fatal`: a malformed write for one key must not take down the whole stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonUnmarshaller;

impl Unmarshaller for JsonUnmarshaller {
    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DataPlaneError> {
        serde_json::from_slice(bytes).map_err(DataPlaneError::from)
    }
}

/// Something that can absorb a decoded [`NotifierEvent`] for one key prefix.
///
/// `EntityCache` implements this today, the same separation `processUpdate`
/// keeps from its `EntityCache` receiver in the original implementation.
/// `FlowEngine`'s classifier/limiter registries do not implement it yet — the
/// notifier stream currently only drives entity updates; wiring selector-
/// bearing limiter configs through this same seam is tracked as future work,
/// not something already wired up here.
pub trait PrefixNotifiee: Send + Sync {
    /// Apply one decoded event. Unknown/malformed payloads are logged and
    /// swallowed by the implementation — the notifier stream itself never
    /// fails on a single bad key.
    ///
    /// Generic over the unmarshaller, not `&dyn Unmarshaller`: `Unmarshaller`
    /// itself isn't object-safe (`unmarshal` is generic over its output
    /// type), so this method is generic too rather than erasing it.
    fn apply_event<U: Unmarshaller>(&self, event: NotifierEvent, unmarshaller: &U);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn json_unmarshaller_decodes_valid_payload() {
        let bytes = br#"{"name":"abc"}"#.to_vec();
        let sample: Sample = JsonUnmarshaller.unmarshal(&bytes).unwrap();
        assert_eq!(sample.name, "abc");
    }

    #[test]
    fn json_unmarshaller_reports_transient_on_garbage() {
        let bytes = b"not json".to_vec();
        let result: Result<Sample, _> = JsonUnmarshaller.unmarshal(&bytes);
        assert!(matches!(result, Err(DataPlaneError::Decode(_))));
    }
}
