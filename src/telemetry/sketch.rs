//! A fixed-`k` mergeable quantile sketch, grounded in the
//! `github.com/fluxninja/datasketches-go` `DoublesSketch(k=128)` the rollup
//! processor feeds with `Update`/`Compact`/`Serialize`.
//!
//! This is a from-scratch Rust rewrite of the classic Munro-Paterson /
//! Greenwald-Khanna compactor cascade (the same family KLL sketches belong
//! to), not a port of the Go library's internal layout: the wire format only
//! needs to be internally self-consistent and deterministic, not
//! byte-compatible with `datasketches-go`.
//!
//! Determinism: compaction never uses randomness. Each level alternates
//! which half of its sorted buffer survives a compaction (tracked by a
//! per-level parity bit), so two sketches built from identical insertion
//! sequences end up in identical internal states and therefore serialize to
//! identical bytes.

use base64::Engine as _;

/// Default sketch capacity-per-level, matching the `k=128` the rollup
/// processor is configured with (§4.4, §6).
pub const DEFAULT_K: u16 = 128;

/// A mergeable approximate quantile sketch over an `f64` stream.
#[derive(Clone, Debug)]
pub struct DoublesSketch {
    k: u16,
    n: u64,
    min: f64,
    max: f64,
    /// `levels[i]` holds raw (unweighted) samples of weight `2^i` each.
    levels: Vec<Vec<f64>>,
    /// Per-level compaction parity: `false` keeps even indices, `true` keeps
    /// odd indices of the sorted buffer; flipped on every compaction of that
    /// level so repeated compactions don't always discard the same parity.
    parities: Vec<bool>,
}

impl DoublesSketch {
    pub fn new(k: u16) -> Self {
        assert!(k >= 2, "sketch capacity must be at least 2");
        Self {
            k,
            n: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            levels: vec![Vec::new()],
            parities: vec![false],
        }
    }

    pub fn k(&self) -> u16 {
        self.k
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    /// Feeds one value into the sketch. NaN is rejected by the caller
    /// (the rollup processor never passes one in; see
    /// [`crate::telemetry::AttributeValue::as_f64`]).
    pub fn update(&mut self, value: f64) {
        debug_assert!(value.is_finite());
        self.n += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.levels[0].push(value);
        self.compact_from(0);
    }

    fn ensure_level(&mut self, level: usize) {
        while self.levels.len() <= level {
            self.levels.push(Vec::new());
            self.parities.push(false);
        }
    }

    fn compact_from(&mut self, mut level: usize) {
        while level < self.levels.len() && self.levels[level].len() as u16 > self.k {
            self.levels[level].sort_by(|a, b| a.partial_cmp(b).unwrap());
            let offset = usize::from(self.parities[level]);
            self.parities[level] = !self.parities[level];
            let survivors: Vec<f64> = self.levels[level]
                .iter()
                .copied()
                .skip(offset)
                .step_by(2)
                .collect();
            self.levels[level].clear();
            self.ensure_level(level + 1);
            self.levels[level + 1].extend(survivors);
            level += 1;
        }
    }

    /// Merges `other` into `self` in place, combining weighted levels and
    /// re-running compaction wherever the merged buffer now overflows its
    /// level's capacity.
    pub fn merge(&mut self, other: &DoublesSketch) {
        if other.n == 0 {
            return;
        }
        self.n += other.n;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.ensure_level(other.levels.len().saturating_sub(1));
        for (level, values) in other.levels.iter().enumerate() {
            self.levels[level].extend(values.iter().copied());
        }
        for level in 0..self.levels.len() {
            self.compact_from(level);
        }
    }

    /// Merges a batch of sketches into one, left-to-right. Returns an empty
    /// sketch of capacity `k` if `sketches` is empty.
    pub fn merge_all(k: u16, sketches: impl IntoIterator<Item = DoublesSketch>) -> DoublesSketch {
        let mut acc = DoublesSketch::new(k);
        for sketch in sketches {
            acc.merge(&sketch);
        }
        acc
    }

    /// Every retained `(value, weight)` pair across all levels, weight being
    /// `2^level`. Used by both rank/quantile estimation and serialization.
    fn weighted_values(&self) -> Vec<(f64, u64)> {
        let mut out = Vec::new();
        for (level, values) in self.levels.iter().enumerate() {
            let weight = 1u64 << level;
            out.extend(values.iter().map(|v| (*v, weight)));
        }
        out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        out
    }

    /// Approximate rank (fraction of the stream `<= value`) in `[0, 1]`.
    pub fn rank(&self, value: f64) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let weighted = self.weighted_values();
        let total: u64 = weighted.iter().map(|(_, w)| w).sum();
        let covered: u64 = weighted
            .iter()
            .filter(|(v, _)| *v <= value)
            .map(|(_, w)| w)
            .sum();
        covered as f64 / total as f64
    }

    /// Approximate value at quantile `q` in `[0, 1]`.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.n == 0 {
            return None;
        }
        let q = q.clamp(0.0, 1.0);
        let weighted = self.weighted_values();
        let total: u64 = weighted.iter().map(|(_, w)| w).sum();
        let target = (q * total as f64).ceil().max(1.0) as u64;
        let mut cumulative = 0u64;
        for (value, weight) in &weighted {
            cumulative += weight;
            if cumulative >= target {
                return Some(*value);
            }
        }
        weighted.last().map(|(v, _)| *v)
    }

    /// Deterministic compact binary serialization: `k` (u16 LE), `n` (u64
    /// LE), `min`/`max` (f64 LE), then each level's sorted values as
    /// `(len: u32 LE, values: f64 LE...)`. Sorting each level's values before
    /// encoding makes the layout canonical even though level order within a
    /// buffer is otherwise insertion-order-dependent.
    pub fn serialize_compact(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.k.to_le_bytes());
        out.extend_from_slice(&self.n.to_le_bytes());
        out.extend_from_slice(&self.min.to_le_bytes());
        out.extend_from_slice(&self.max.to_le_bytes());
        out.extend_from_slice(&(self.levels.len() as u32).to_le_bytes());
        for values in &self.levels {
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            out.extend_from_slice(&(sorted.len() as u32).to_le_bytes());
            for v in sorted {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    /// Base64(standard) of [`Self::serialize_compact`], the form the rollup
    /// processor writes into `<field>.sketch`.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.serialize_compact())
    }

    pub fn deserialize_compact(bytes: &[u8]) -> Option<DoublesSketch> {
        let mut cursor = 0usize;
        let take = |cursor: &mut usize, len: usize| -> Option<&[u8]> {
            let slice = bytes.get(*cursor..*cursor + len)?;
            *cursor += len;
            Some(slice)
        };
        let k = u16::from_le_bytes(take(&mut cursor, 2)?.try_into().ok()?);
        let n = u64::from_le_bytes(take(&mut cursor, 8)?.try_into().ok()?);
        let min = f64::from_le_bytes(take(&mut cursor, 8)?.try_into().ok()?);
        let max = f64::from_le_bytes(take(&mut cursor, 8)?.try_into().ok()?);
        let level_count = u32::from_le_bytes(take(&mut cursor, 4)?.try_into().ok()?) as usize;
        let mut levels = Vec::with_capacity(level_count);
        for _ in 0..level_count {
            let len = u32::from_le_bytes(take(&mut cursor, 4)?.try_into().ok()?) as usize;
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                values.push(f64::from_le_bytes(take(&mut cursor, 8)?.try_into().ok()?));
            }
            levels.push(values);
        }
        let parities = vec![false; levels.len()];
        Some(DoublesSketch {
            k,
            n,
            min,
            max,
            levels,
            parities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_update_round_trips_through_base64() {
        let mut sketch = DoublesSketch::new(DEFAULT_K);
        sketch.update(5.0);
        let decoded_bytes =
            base64::engine::general_purpose::STANDARD.decode(sketch.to_base64()).unwrap();
        let decoded = DoublesSketch::deserialize_compact(&decoded_bytes).unwrap();
        assert_eq!(decoded.n(), 1);
        assert_eq!(decoded.min(), Some(5.0));
        assert_eq!(decoded.max(), Some(5.0));
    }

    #[test]
    fn serialization_is_deterministic_for_identical_sequences() {
        let build = || {
            let mut s = DoublesSketch::new(DEFAULT_K);
            for v in [5.0, 6.0, 7.0, 1.0, 9.0, 3.0] {
                s.update(v);
            }
            s
        };
        assert_eq!(build().serialize_compact(), build().serialize_compact());
    }

    #[test]
    fn merge_of_two_halves_matches_one_combined_sketch_within_bound() {
        let mut whole = DoublesSketch::new(DEFAULT_K);
        let mut first = DoublesSketch::new(DEFAULT_K);
        let mut second = DoublesSketch::new(DEFAULT_K);
        for i in 0..2000u32 {
            let v = i as f64;
            whole.update(v);
            if i % 2 == 0 {
                first.update(v);
            } else {
                second.update(v);
            }
        }
        first.merge(&second);
        assert_eq!(first.n(), whole.n());
        // Rank-approximate agreement: both should place the median near 1000
        // within a generous tolerance for this sketch's error bound.
        let whole_median = whole.quantile(0.5).unwrap();
        let merged_median = first.quantile(0.5).unwrap();
        assert!(
            (whole_median - merged_median).abs() < 150.0,
            "whole={whole_median} merged={merged_median}"
        );
    }

    #[test]
    fn min_max_and_count_are_exact_regardless_of_compaction() {
        let mut sketch = DoublesSketch::new(4);
        for v in [5.0, 6.0, 7.0, 100.0, -3.0, 2.0, 8.0, 9.0, 0.5] {
            sketch.update(v);
        }
        assert_eq!(sketch.n(), 9);
        assert_eq!(sketch.min(), Some(-3.0));
        assert_eq!(sketch.max(), Some(100.0));
    }
}
