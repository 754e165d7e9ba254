use std::borrow::Cow;

/// Generic alias for an observability attribute key.
///
/// `Cow<'a, str>` covers both static constants and dynamically built key
/// names without forcing an allocation on the common static-key path. Keys
/// should be low-cardinality, snake_case, and pass through metrics/logging
/// export unchanged.
pub type AttributeKey<'a> = Cow<'a, str>;

/// One structured attribute key-value entry.
///
/// Metrics, logging and the telemetry pipeline all share this shape: `value`
/// is a [`MetricAttributeValue`] covering bool/int/float/text scalars, so a
/// number is never forced through a string and loses precision.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue<'a> {
    pub key: AttributeKey<'a>,
    pub value: MetricAttributeValue<'a>,
}

impl<'a> KeyValue<'a> {
    pub fn new(
        key: impl Into<AttributeKey<'a>>,
        value: impl Into<MetricAttributeValue<'a>>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A borrowed, non-owning view over an attribute set; lifetime is the
/// caller's responsibility.
///
/// Entries must not repeat a key; implementations must not cache this
/// reference past the call that handed it in.
pub type AttributeSet<'a> = &'a [KeyValue<'a>];

/// Unified attribute value for both metrics and logging.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum MetricAttributeValue<'a> {
    Text(Cow<'a, str>),
    Bool(bool),
    F64(f64),
    I64(i64),
}

impl<'a> From<&'a str> for MetricAttributeValue<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for MetricAttributeValue<'_> {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

impl<'a> From<Cow<'a, str>> for MetricAttributeValue<'a> {
    fn from(value: Cow<'a, str>) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for MetricAttributeValue<'_> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for MetricAttributeValue<'_> {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<i64> for MetricAttributeValue<'_> {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<u64> for MetricAttributeValue<'_> {
    fn from(value: u64) -> Self {
        if value > i64::MAX as u64 {
            MetricAttributeValue::I64(i64::MAX)
        } else {
            MetricAttributeValue::I64(value as i64)
        }
    }
}

impl<'a> MetricAttributeValue<'a> {
    /// Converts to an owned form suitable for long-lived caching or cross-thread transfer.
    pub fn into_owned(self) -> MetricAttributeValue<'static> {
        match self {
            MetricAttributeValue::Text(text) => {
                MetricAttributeValue::Text(Cow::Owned(text.into_owned()))
            }
            MetricAttributeValue::Bool(value) => MetricAttributeValue::Bool(value),
            MetricAttributeValue::F64(value) => MetricAttributeValue::F64(value),
            MetricAttributeValue::I64(value) => MetricAttributeValue::I64(value),
        }
    }
}

/// Helper for building an owned attribute set without repeated allocation on hot paths.
#[derive(Default, Clone, Debug)]
pub struct OwnedAttributeSet {
    entries: Vec<KeyValue<'static>>,
}

impl OwnedAttributeSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Extends this set with owned copies of the entries in a borrowed view.
    pub fn extend_from(&mut self, borrowed: AttributeSet<'_>) {
        self.entries.reserve(borrowed.len());
        for kv in borrowed {
            self.entries.push(KeyValue {
                key: Cow::Owned(kv.key.clone().into_owned()),
                value: kv.value.clone().into_owned(),
            });
        }
    }

    pub fn push_owned(
        &mut self,
        key: impl Into<AttributeKey<'static>>,
        value: impl Into<MetricAttributeValue<'static>>,
    ) {
        self.entries.push(KeyValue {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn as_slice(&self) -> AttributeSet<'_> {
        self.entries.as_slice()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
