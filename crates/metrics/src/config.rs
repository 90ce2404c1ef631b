//! Registry configuration.

use serde::{Deserialize, Serialize};

use crate::{
    definitions::{DEFAULT_BUCKETS, DEFAULT_QUANTILES, DEFAULT_SUMMARY_MAX_SAMPLES},
    error::{Error, Result},
    labels::sanitize_metric_name,
    value::{validate_buckets, validate_quantiles},
};

/// Registry-wide defaults and facade options.
///
/// ```toml
/// default_buckets = [0.01, 0.1, 1.0, 10.0]
/// default_quantiles = [0.5, 0.9, 0.99]
/// summary_max_samples = 2048
/// prefix = "myapp"
/// install_recorder = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsRecorderConfig {
    /// Histogram bounds used when a histogram is created without its own.
    pub default_buckets: Vec<f64>,
    /// Quantiles used when a summary is created without its own.
    pub default_quantiles: Vec<f64>,
    /// Sliding window size of the summary quantile estimator.
    pub summary_max_samples: usize,
    /// Namespace prepended to metric names created through the facade.
    pub prefix: Option<String>,
    /// Whether [`init_metrics`](crate::init_metrics) installs the registry
    /// as the `metrics` crate's global recorder.
    pub install_recorder: bool,
}

impl Default for MetricsRecorderConfig {
    fn default() -> Self {
        Self {
            default_buckets: DEFAULT_BUCKETS.to_vec(),
            default_quantiles: DEFAULT_QUANTILES.to_vec(),
            summary_max_samples: DEFAULT_SUMMARY_MAX_SAMPLES,
            prefix: None,
            install_recorder: true,
        }
    }
}

impl MetricsRecorderConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the same checks metric creation applies to explicit buckets and
    /// quantiles, so a bad default fails at startup rather than first use.
    pub fn validate(&self) -> Result<()> {
        validate_buckets(self.default_buckets.clone())?;
        validate_quantiles(self.default_quantiles.clone())?;
        if self.summary_max_samples == 0 {
            return Err(Error::Config("summary_max_samples must be at least 1".into()));
        }
        if self.prefix.as_deref() == Some("") {
            return Err(Error::Config("prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Exposition name for a facade label: prefixed, then sanitized.
    pub fn metric_name(&self, label: &str) -> String {
        match &self.prefix {
            Some(prefix) => sanitize_metric_name(&format!("{prefix}_{label}")),
            None => sanitize_metric_name(label),
        }
    }
}
