//! Metrics collection and Prometheus text exposition for tally.
//!
//! A [`Registry`] holds counters, gauges, histograms, summaries and info
//! metrics, each fanned out over a fixed set of label names into one
//! timeseries per distinct [`LabelSet`]. [`Registry::get_metrics`] renders
//! the lot in the Prometheus text format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tally_metrics::{LabelSet, LabelShape, Registry};
//!
//! let registry = Registry::new();
//! let requests = registry.create_counter(
//!     "http_requests_total",
//!     Some("Requests served"),
//!     0.0,
//!     LabelShape::new(["route"])?,
//! )?;
//! requests.increment_with(1.0, &LabelSet::new([("route", "/api/chat")])?)?;
//!
//! print!("{}", registry.get_metrics());
//! ```
//!
//! The registry is also a `metrics` crate recorder, so after
//! [`init_metrics`] the facade macros record into it:
//!
//! ```rust,ignore
//! use tally_metrics::{counter, gauge, histogram};
//!
//! counter!("http_requests_total", "endpoint" => "/api/chat").increment(1);
//! gauge!("active_sessions").set(42.0);
//! histogram!("request_duration_seconds").record(0.123);
//! ```

mod config;
mod definitions;
mod error;
pub mod exposition;
mod facade;
mod labels;
mod metric;
mod recorder;
mod registry;
mod snapshot;
mod value;

pub use {
    config::MetricsRecorderConfig,
    definitions::*,
    error::{Error, Result},
    facade::{CounterHandler, MetricsFactory, RecorderHandler, TimerHandler},
    labels::{LabelSet, LabelShape, is_valid_label_name, is_valid_metric_name, sanitize_metric_name},
    metric::{Counter, Gauge, Histogram, Info, MetricKind, Summary},
    recorder::{MetricsHandle, active, bootstrap, init_metrics},
    registry::Registry,
    snapshot::{
        BucketSnapshot, FamilySnapshot, MetricsSnapshot, QuantileSnapshot, SampleValue,
        SeriesSnapshot,
    },
};

// Re-export metrics macros for convenience
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
