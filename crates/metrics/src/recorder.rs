//! Bridge into the `metrics` crate and the process-wide registry slot.
//!
//! With the registry installed as the global recorder, the facade macros
//! (`counter!`, `gauge!`, `histogram!`) land in it and show up on the next
//! scrape.

use std::sync::Arc;

use {
    metrics::{Key, KeyName, Metadata, SharedString, Unit},
    once_cell::sync::OnceCell,
    tracing::{info, warn},
};

use crate::{
    config::MetricsRecorderConfig,
    error::{Error, Result},
    facade::{BoundCounter, BoundGauge, BoundHistogram, CounterHandler, RecorderHandler},
    registry::Registry,
    snapshot::MetricsSnapshot,
};

static ACTIVE: OnceCell<Registry> = OnceCell::new();

/// Install `registry` as the process-wide active registry. The slot can be
/// filled once.
pub fn bootstrap(registry: Registry) -> Result<()> {
    ACTIVE
        .set(registry)
        .map_err(|_| Error::AlreadyBootstrapped)?;
    info!("metrics registry bootstrapped");
    Ok(())
}

/// The process-wide active registry.
pub fn active() -> Result<Registry> {
    ACTIVE.get().cloned().ok_or(Error::NotBootstrapped)
}

/// Handle returned by [`init_metrics`], for whatever serves the scrape.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Exposition text, served as [`CONTENT_TYPE`](crate::CONTENT_TYPE).
    pub fn render(&self) -> String {
        self.registry.get_metrics()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Build a registry from `config`, make it the active registry and, when
/// `install_recorder` is set, the `metrics` crate's global recorder.
///
/// The recorder is installed while the slot is being filled, so it always
/// points at the active registry.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    let mut created = false;
    let registry = ACTIVE.get_or_try_init(|| {
        let install = config.install_recorder;
        let registry = Registry::with_config(config)?;
        if install {
            install_global(&registry)?;
        }
        created = true;
        Ok::<_, Error>(registry)
    })?;
    if !created {
        return Err(Error::AlreadyBootstrapped);
    }
    info!("metrics registry bootstrapped");

    Ok(MetricsHandle {
        registry: registry.clone(),
    })
}

fn install_global(registry: &Registry) -> Result<()> {
    metrics::set_global_recorder(registry.clone())
        .map_err(|_| Error::Config("another global metrics recorder is already installed".into()))
}

fn dimensions(key: &Key) -> Vec<(String, String)> {
    key.labels()
        .map(|label| (label.key().to_string(), label.value().to_string()))
        .collect()
}

// Registration cannot return errors here, so failures hand back a no-op
// metric.
impl metrics::Recorder for Registry {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(&self.config().metric_name(key.as_str()), &description);
    }

    fn describe_gauge(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(&self.config().metric_name(key.as_str()), &description);
    }

    fn describe_histogram(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(&self.config().metric_name(key.as_str()), &description);
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Counter {
        match self.bind_counter(key.name(), &dimensions(key)) {
            Ok(counter) => metrics::Counter::from_arc(Arc::new(counter)),
            Err(error) => {
                warn!(metric = key.name(), %error, "counter not registered");
                metrics::Counter::noop()
            },
        }
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Gauge {
        match self.bind_gauge(key.name(), &dimensions(key)) {
            Ok(gauge) => metrics::Gauge::from_arc(Arc::new(gauge)),
            Err(error) => {
                warn!(metric = key.name(), %error, "gauge not registered");
                metrics::Gauge::noop()
            },
        }
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Histogram {
        match self.bind_histogram(key.name(), &dimensions(key)) {
            Ok(histogram) => metrics::Histogram::from_arc(Arc::new(histogram)),
            Err(error) => {
                warn!(metric = key.name(), %error, "histogram not registered");
                metrics::Histogram::noop()
            },
        }
    }
}

impl metrics::CounterFn for BoundCounter {
    fn increment(&self, value: u64) {
        CounterHandler::increment(self, value);
    }

    fn absolute(&self, value: u64) {
        BoundCounter::absolute(self, value);
    }
}

impl metrics::GaugeFn for BoundGauge {
    fn increment(&self, value: f64) {
        BoundGauge::increment(self, value);
    }

    fn decrement(&self, value: f64) {
        BoundGauge::decrement(self, value);
    }

    fn set(&self, value: f64) {
        BoundGauge::set(self, value);
    }
}

impl metrics::HistogramFn for BoundHistogram {
    fn record(&self, value: f64) {
        RecorderHandler::record(self, value);
    }
}
