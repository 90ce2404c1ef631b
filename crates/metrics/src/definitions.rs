//! Registry-wide constants and bucket helpers.
//!
//! Defaults here are what the registry ships with; every histogram and
//! summary can override them at creation time, and
//! [`MetricsRecorderConfig`](crate::MetricsRecorderConfig) can replace them
//! for a whole registry.

/// Content type of the text exposition served to scrapers.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Default histogram bucket upper bounds, in seconds.
/// Covers 5ms to 10s; the `+Inf` bucket is implicit.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Default quantiles tracked by summaries.
pub const DEFAULT_QUANTILES: &[f64] = &[0.01, 0.05, 0.5, 0.9, 0.95, 0.99, 0.999];

/// Number of most recent observations a summary series keeps for quantile
/// estimation.
pub const DEFAULT_SUMMARY_MAX_SAMPLES: usize = 1024;

/// Synthetic label carrying a histogram bucket bound.
pub const BUCKET_LABEL: &str = "le";

/// Synthetic label carrying a summary quantile.
pub const QUANTILE_LABEL: &str = "quantile";

/// Suffix appended to info metric names in the exposition.
pub const INFO_SUFFIX: &str = "_info";

/// Sample suffixes of histogram and summary families.
pub const BUCKET_SUFFIX: &str = "_bucket";
pub const SUM_SUFFIX: &str = "_sum";
pub const COUNT_SUFFIX: &str = "_count";

/// `count` buckets starting at `start`, each `width` apart.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + width * i as f64).collect()
}

/// `count` buckets starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    std::iter::successors(Some(start), |b| Some(b * factor))
        .take(count)
        .collect()
}
