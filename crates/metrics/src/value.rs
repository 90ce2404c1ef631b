//! Per-series value records and their aggregation rules.
//!
//! Counters and gauges are a single atomic float. Histograms and summaries
//! update several fields per observation, so each series guards its state
//! with its own mutex; unrelated series never contend.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::error::{Error, Result};

/// `f64` stored as bits in an [`AtomicU64`].
#[derive(Debug)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub(crate) fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    pub(crate) fn add(&self, delta: f64) {
        self.update(|current| current + delta);
    }

    /// Raise the value to `value` if it is larger.
    pub(crate) fn fetch_max(&self, value: f64) {
        self.update(|current| current.max(value));
    }

    fn update(&self, f: impl Fn(f64) -> f64) {
        // The closure never returns None, so fetch_update cannot fail.
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(f(f64::from_bits(bits)).to_bits())
            });
    }
}

/// Validate histogram upper bounds.
///
/// A trailing `+Inf` is accepted and dropped since that bucket is always
/// implied. Every other bound must be finite and strictly greater than the
/// one before it.
pub(crate) fn validate_buckets(mut bounds: Vec<f64>) -> Result<Vec<f64>> {
    if bounds.last() == Some(&f64::INFINITY) {
        bounds.pop();
    }
    if let Some(bad) = bounds.iter().find(|b| !b.is_finite()) {
        return Err(Error::InvalidBuckets(format!("bound {bad} is not finite")));
    }
    if let Some(w) = bounds.windows(2).find(|w| w[0] >= w[1]) {
        return Err(Error::InvalidBuckets(format!(
            "bounds must be strictly ascending, found {} followed by {}",
            w[0], w[1]
        )));
    }
    Ok(bounds)
}

/// Validate summary quantiles, returning them sorted and deduplicated.
pub(crate) fn validate_quantiles(mut quantiles: Vec<f64>) -> Result<Vec<f64>> {
    if let Some(bad) = quantiles.iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
        return Err(Error::InvalidQuantile(*bad));
    }
    quantiles.sort_by(f64::total_cmp);
    quantiles.dedup();
    Ok(quantiles)
}

/// Cumulative bucket counts for one histogram series.
#[derive(Debug, Clone)]
pub(crate) struct HistogramState {
    /// `cumulative[i]` counts observations `<= bounds[i]`.
    cumulative: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramState {
    pub(crate) fn new(buckets: usize) -> Self {
        Self {
            cumulative: vec![0; buckets],
            sum: 0.0,
            count: 0,
        }
    }

    pub(crate) fn observe(&mut self, bounds: &[f64], value: f64) {
        // NaN compares false against every bound and lands only in +Inf.
        if !value.is_nan() {
            let first = bounds.partition_point(|b| *b < value);
            for bucket in &mut self.cumulative[first..] {
                *bucket += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }

    pub(crate) fn sum(&self) -> f64 {
        self.sum
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

/// Sliding-window quantile state for one summary series.
///
/// The estimator keeps the most recent `max_samples` observations and
/// answers quantiles by nearest rank over that window: exact while fewer
/// than `max_samples` values were observed, and describing only the recent
/// window afterwards. `sum` and `count` always cover every observation.
#[derive(Debug, Clone)]
pub(crate) struct SummaryState {
    window: VecDeque<f64>,
    max_samples: usize,
    sum: f64,
    count: u64,
}

impl SummaryState {
    pub(crate) fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            window: VecDeque::with_capacity(max_samples.min(64)),
            max_samples,
            sum: 0.0,
            count: 0,
        }
    }

    pub(crate) fn observe(&mut self, value: f64) {
        if self.window.len() == self.max_samples {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.sum += value;
        self.count += 1;
    }

    /// Estimates for each quantile, in the order given. `NaN` while empty.
    pub(crate) fn quantiles(&self, quantiles: &[f64]) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        quantiles.iter().map(|q| nearest_rank(&sorted, *q)).collect()
    }

    pub(crate) fn sum(&self) -> f64 {
        self.sum
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let n = sorted.len();
    let rank = (q * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}
