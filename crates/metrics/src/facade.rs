//! Adapter from a dimension-less, generic metrics vocabulary onto the
//! registry.
//!
//! Generic callers create a handle once with a fixed set of dimensions and
//! then only ever update that one timeseries. Dimensions become the label
//! set of the series, and their names the label shape of the metric, so
//! two handles with the same name and dimension names but different values
//! share a metric and differ by series.

use std::sync::Arc;

use tracing::warn;

use crate::{
    error::Result,
    labels::{LabelSet, LabelShape},
    metric::{Counter, Gauge, Histogram, Summary},
    registry::Registry,
};

/// Monotonic counter bound to one timeseries.
pub trait CounterHandler: Send + Sync {
    fn increment(&self, by: u64);
    /// Return the counter to its initial value.
    fn reset(&self);
}

/// Value recorder bound to one timeseries.
pub trait RecorderHandler: Send + Sync {
    fn record(&self, value: f64);
}

/// Duration recorder bound to one timeseries.
pub trait TimerHandler: Send + Sync {
    /// Observed in seconds.
    fn record_nanoseconds(&self, duration: u64);
}

/// The creation side of a generic metrics facade.
pub trait MetricsFactory {
    fn make_counter(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<Arc<dyn CounterHandler>>;

    /// `aggregate` recorders keep the distribution (a histogram with the
    /// default buckets); non-aggregating ones keep the latest value (a gauge).
    fn make_recorder(
        &self,
        label: &str,
        dimensions: &[(String, String)],
        aggregate: bool,
    ) -> Result<Arc<dyn RecorderHandler>>;

    /// Timers are summaries with the default quantiles.
    fn make_timer(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<Arc<dyn TimerHandler>>;
}

fn bind(dimensions: &[(String, String)]) -> Result<(LabelSet, LabelShape)> {
    let labels = LabelSet::new(dimensions.iter().cloned())?;
    let shape = LabelShape::of(&labels)?;
    Ok((labels, shape))
}

impl Registry {
    pub(crate) fn bind_counter(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<BoundCounter> {
        let (labels, shape) = bind(dimensions)?;
        let counter = self.create_counter(&self.config().metric_name(label), None, 0.0, shape)?;
        Ok(BoundCounter { counter, labels })
    }

    pub(crate) fn bind_gauge(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<BoundGauge> {
        let (labels, shape) = bind(dimensions)?;
        let gauge = self.create_gauge(&self.config().metric_name(label), None, 0.0, shape)?;
        Ok(BoundGauge { gauge, labels })
    }

    pub(crate) fn bind_histogram(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<BoundHistogram> {
        let (labels, shape) = bind(dimensions)?;
        let histogram =
            self.create_histogram(&self.config().metric_name(label), None, None, shape)?;
        Ok(BoundHistogram { histogram, labels })
    }

    pub(crate) fn bind_timer(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<BoundTimer> {
        let (labels, shape) = bind(dimensions)?;
        let summary = self.create_summary(&self.config().metric_name(label), None, None, shape)?;
        Ok(BoundTimer { summary, labels })
    }
}

impl MetricsFactory for Registry {
    fn make_counter(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<Arc<dyn CounterHandler>> {
        Ok(Arc::new(self.bind_counter(label, dimensions)?))
    }

    fn make_recorder(
        &self,
        label: &str,
        dimensions: &[(String, String)],
        aggregate: bool,
    ) -> Result<Arc<dyn RecorderHandler>> {
        if aggregate {
            Ok(Arc::new(self.bind_histogram(label, dimensions)?))
        } else {
            Ok(Arc::new(self.bind_gauge(label, dimensions)?))
        }
    }

    fn make_timer(
        &self,
        label: &str,
        dimensions: &[(String, String)],
    ) -> Result<Arc<dyn TimerHandler>> {
        Ok(Arc::new(self.bind_timer(label, dimensions)?))
    }
}

/// Handler updates cannot return errors; report them instead.
fn report(metric: &str, result: Result<()>) {
    if let Err(error) = result {
        warn!(metric, %error, "dropped metric update");
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BoundCounter {
    counter: Counter,
    labels: LabelSet,
}

impl BoundCounter {
    pub(crate) fn absolute(&self, value: u64) {
        report(
            self.counter.name(),
            self.counter.absolute_with(value as f64, &self.labels),
        );
    }
}

impl CounterHandler for BoundCounter {
    fn increment(&self, by: u64) {
        report(
            self.counter.name(),
            self.counter.increment_with(by as f64, &self.labels),
        );
    }

    fn reset(&self) {
        report(self.counter.name(), self.counter.reset_with(&self.labels));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BoundGauge {
    gauge: Gauge,
    labels: LabelSet,
}

impl BoundGauge {
    pub(crate) fn set(&self, value: f64) {
        report(self.gauge.name(), self.gauge.set_with(value, &self.labels));
    }

    pub(crate) fn increment(&self, delta: f64) {
        report(self.gauge.name(), self.gauge.increment_with(delta, &self.labels));
    }

    pub(crate) fn decrement(&self, delta: f64) {
        report(self.gauge.name(), self.gauge.decrement_with(delta, &self.labels));
    }
}

impl RecorderHandler for BoundGauge {
    fn record(&self, value: f64) {
        self.set(value);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BoundHistogram {
    histogram: Histogram,
    labels: LabelSet,
}

impl RecorderHandler for BoundHistogram {
    fn record(&self, value: f64) {
        report(
            self.histogram.name(),
            self.histogram.observe_with(value, &self.labels),
        );
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BoundTimer {
    summary: Summary,
    labels: LabelSet,
}

impl TimerHandler for BoundTimer {
    fn record_nanoseconds(&self, duration: u64) {
        let seconds = duration as f64 / 1_000_000_000.0;
        report(self.summary.name(), self.summary.observe_with(seconds, &self.labels));
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::Error,
            metric::MetricKind,
            snapshot::{QuantileSnapshot, SampleValue},
        },
    };

    fn dims(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_counter_uses_dimensions_as_labels() {
        let registry = Registry::new();
        let get = registry
            .make_counter("http.requests", &dims(&[("method", "GET")]))
            .unwrap();
        let post = registry
            .make_counter("http.requests", &dims(&[("method", "POST")]))
            .unwrap();
        get.increment(2);
        post.increment(1);
        get.increment(3);

        assert_eq!(registry.len(), 1);
        let snapshot = registry.snapshot();
        let family = snapshot.family("http_requests").unwrap();
        let get_labels = LabelSet::new([("method", "GET")]).unwrap();
        assert_eq!(
            family.series(&get_labels),
            Some(&SampleValue::Counter { value: 5.0 })
        );
        assert_eq!(family.series.len(), 2);
    }

    #[test]
    fn test_counter_reset() {
        let registry = Registry::new();
        let counter = registry.make_counter("retries", &[]).unwrap();
        counter.increment(4);
        counter.reset();
        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.families[0].series[0].value,
            SampleValue::Counter { value: 0.0 }
        );
    }

    #[test]
    fn test_recorder_kind_follows_aggregate_flag() {
        let registry = Registry::new();
        registry.make_recorder("payload_bytes", &[], true).unwrap();
        registry.make_recorder("queue_len", &[], false).unwrap();
        assert_eq!(registry.kind_of("payload_bytes"), Some(MetricKind::Histogram));
        assert_eq!(registry.kind_of("queue_len"), Some(MetricKind::Gauge));
    }

    #[test]
    fn test_non_aggregating_recorder_keeps_latest() {
        let registry = Registry::new();
        let recorder = registry.make_recorder("queue_len", &[], false).unwrap();
        recorder.record(4.0);
        recorder.record(2.0);
        assert!(registry.get_metrics().contains("queue_len 2\n"));
    }

    #[test]
    fn test_timer_records_seconds() {
        let registry = Registry::new();
        let timer = registry.make_timer("db.query", &[]).unwrap();
        timer.record_nanoseconds(1_500_000_000);

        let snapshot = registry.snapshot();
        let family = snapshot.family("db_query").unwrap();
        assert_eq!(family.kind, MetricKind::Summary);
        match &family.series[0].value {
            SampleValue::Summary {
                quantiles,
                sum,
                count,
            } => {
                assert_eq!(*count, 1);
                assert_eq!(*sum, 1.5);
                assert!(quantiles.contains(&QuantileSnapshot {
                    quantile: 0.5,
                    value: 1.5,
                }));
            },
            other => panic!("expected summary, got {other:?}"),
        }
    }

    #[test]
    fn test_dimension_names_fix_the_shape() {
        let registry = Registry::new();
        registry
            .make_counter("jobs", &dims(&[("queue", "a")]))
            .unwrap();
        let err = registry
            .make_counter("jobs", &dims(&[("worker", "1")]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::LabelShapeConflict { .. }));
    }

    #[test]
    fn test_prefix_applies_to_facade_names() {
        let config = crate::MetricsRecorderConfig {
            prefix: Some("svc".into()),
            ..Default::default()
        };
        let registry = Registry::with_config(config).unwrap();
        registry.make_counter("started", &[]).unwrap();
        assert_eq!(registry.kind_of("svc_started"), Some(MetricKind::Counter));
    }
}
