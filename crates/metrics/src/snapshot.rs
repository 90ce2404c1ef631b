//! Point-in-time copies of registry state.
//!
//! The registry copies values out under its structural lock and formats
//! them afterwards; these types are that copy. They also serialize to JSON
//! for consumers that want structured data rather than exposition text.

use serde::Serialize;

use crate::{exposition, labels::LabelSet, metric::MetricKind};

/// Every registered metric, in registration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub families: Vec<FamilySnapshot>,
}

/// One metric and all of its timeseries.
#[derive(Debug, Clone, Serialize)]
pub struct FamilySnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub kind: MetricKind,
    /// Series ordered by label set.
    pub series: Vec<SeriesSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSnapshot {
    pub labels: LabelSet,
    pub value: SampleValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SampleValue {
    Counter {
        value: f64,
    },
    Gauge {
        value: f64,
    },
    Histogram {
        /// Finite buckets only; the `+Inf` bucket equals `count`.
        buckets: Vec<BucketSnapshot>,
        sum: f64,
        count: u64,
    },
    Summary {
        quantiles: Vec<QuantileSnapshot>,
        sum: f64,
        count: u64,
    },
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketSnapshot {
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileSnapshot {
    pub quantile: f64,
    pub value: f64,
}

impl MetricsSnapshot {
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Render as Prometheus text exposition.
    pub fn render(&self) -> String {
        exposition::render(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl FamilySnapshot {
    pub fn series(&self, labels: &LabelSet) -> Option<&SampleValue> {
        self.series
            .iter()
            .find(|s| &s.labels == labels)
            .map(|s| &s.value)
    }
}
