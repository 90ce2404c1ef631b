//! The metric registry.
//!
//! One mutex guards the registry structure: the name → family map, the
//! registration order, and the creation of new series inside any family.
//! Creation calls and snapshots both take it, so a snapshot never observes
//! a half-built metric. Value updates on existing series bypass it entirely.
//!
//! Sample names are unique across the registry: a histogram `latency` owns
//! `latency_bucket`, `latency_sum` and `latency_count`, and an info metric
//! `build` owns `build_info`, so no other metric may be registered under
//! those names.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{debug, warn};

use crate::{
    config::MetricsRecorderConfig,
    definitions::{
        BUCKET_LABEL, BUCKET_SUFFIX, COUNT_SUFFIX, INFO_SUFFIX, QUANTILE_LABEL, SUM_SUFFIX,
    },
    error::{Error, Result},
    labels::{LabelShape, is_valid_metric_name},
    metric::{self, Aggregation, Counter, Family, Gauge, Histogram, Info, MetricKind, Summary},
    snapshot::MetricsSnapshot,
    value::{validate_buckets, validate_quantiles},
};

#[derive(Default)]
pub(crate) struct State {
    families: Vec<Arc<Family>>,
    index: HashMap<String, usize>,
    /// Every sample name a family renders, mapped to that family.
    emitted: HashMap<String, usize>,
    /// Help text supplied before the metric itself was created.
    descriptions: HashMap<String, String>,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    config: MetricsRecorderConfig,
}

impl Shared {
    /// Take the structural lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        metric::lock(&self.state)
    }
}

/// Collection of metrics keyed by name, rendered together on scrape.
///
/// Cloning is cheap and every clone shares the same metrics.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry using the built-in defaults.
    pub fn new() -> Self {
        Self::from_parts(MetricsRecorderConfig::default())
    }

    /// An empty registry whose default buckets, quantiles and summary
    /// window come from `config`.
    pub fn with_config(config: MetricsRecorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: MetricsRecorderConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &MetricsRecorderConfig {
        &self.shared.config
    }

    /// Create a counter, or return the existing one of the same name.
    ///
    /// `initial` seeds every series of the counter when it is first created.
    pub fn create_counter(
        &self,
        name: &str,
        help: Option<&str>,
        initial: f64,
        shape: LabelShape,
    ) -> Result<Counter> {
        if initial.is_nan() || initial < 0.0 {
            return Err(Error::Config(format!(
                "counter '{name}' initial value {initial} must be non-negative"
            )));
        }
        let family = self.register(name, help, shape, Aggregation::Counter { initial })?;
        Ok(Counter::new(family, Arc::clone(&self.shared)))
    }

    pub fn create_gauge(
        &self,
        name: &str,
        help: Option<&str>,
        initial: f64,
        shape: LabelShape,
    ) -> Result<Gauge> {
        let family = self.register(name, help, shape, Aggregation::Gauge { initial })?;
        Ok(Gauge::new(family, Arc::clone(&self.shared)))
    }

    /// Create a histogram. `None` buckets use the registry defaults.
    pub fn create_histogram(
        &self,
        name: &str,
        help: Option<&str>,
        buckets: Option<Vec<f64>>,
        shape: LabelShape,
    ) -> Result<Histogram> {
        let bounds = validate_buckets(
            buckets.unwrap_or_else(|| self.shared.config.default_buckets.clone()),
        )?;
        let aggregation = Aggregation::Histogram {
            bounds: Arc::from(bounds),
        };
        let family = self.register(name, help, shape, aggregation)?;
        Ok(Histogram::new(family, Arc::clone(&self.shared)))
    }

    /// Create a summary. `None` quantiles use the registry defaults.
    pub fn create_summary(
        &self,
        name: &str,
        help: Option<&str>,
        quantiles: Option<Vec<f64>>,
        shape: LabelShape,
    ) -> Result<Summary> {
        let quantiles = validate_quantiles(
            quantiles.unwrap_or_else(|| self.shared.config.default_quantiles.clone()),
        )?;
        let aggregation = Aggregation::Summary {
            quantiles: Arc::from(quantiles),
            max_samples: self.shared.config.summary_max_samples,
        };
        let family = self.register(name, help, shape, aggregation)?;
        Ok(Summary::new(family, Arc::clone(&self.shared)))
    }

    pub fn create_info(&self, name: &str, help: Option<&str>, shape: LabelShape) -> Result<Info> {
        let family = self.register(name, help, shape, Aggregation::Info)?;
        Ok(Info::new(family, Arc::clone(&self.shared)))
    }

    fn register(
        &self,
        name: &str,
        help: Option<&str>,
        shape: LabelShape,
        aggregation: Aggregation,
    ) -> Result<Arc<Family>> {
        let kind = aggregation.kind();
        if !is_valid_metric_name(name) {
            return Err(Error::InvalidMetricName(name.to_string()));
        }
        let reserved = match kind {
            MetricKind::Histogram => Some(BUCKET_LABEL),
            MetricKind::Summary => Some(QUANTILE_LABEL),
            _ => None,
        };
        if let Some(label) = reserved.filter(|label| shape.contains(label)) {
            return Err(Error::ReservedLabel {
                label: label.to_string(),
                kind,
            });
        }

        let mut state = self.shared.lock();
        if let Some(&idx) = state.index.get(name) {
            let existing = &state.families[idx];
            if existing.kind() != kind {
                warn!(metric = name, existing = %existing.kind(), requested = %kind, "metric kind conflict");
                return Err(Error::KindConflict {
                    name: name.to_string(),
                    existing: existing.kind(),
                    requested: kind,
                });
            }
            if existing.shape() != &shape {
                warn!(metric = name, existing = ?existing.shape().names(), requested = ?shape.names(), "metric label shape conflict");
                return Err(Error::LabelShapeConflict {
                    name: name.to_string(),
                    existing: existing.shape().names().to_vec(),
                    requested: shape.names().to_vec(),
                });
            }
            if !same_parameters(existing.aggregation(), &aggregation) {
                warn!(metric = name, kind = %kind, "re-registration with different parameters ignored, keeping the first registration");
            }
            if let Some(help) = help {
                existing.describe(help);
            }
            debug!(metric = name, kind = %kind, "metric already registered, reusing");
            return Ok(Arc::clone(existing));
        }

        let samples = sample_names(name, kind);
        if let Some((sample, &idx)) = samples
            .iter()
            .find_map(|sample| state.emitted.get_key_value(sample.as_str()))
        {
            let existing = state.families[idx].name().to_string();
            warn!(metric = name, sample = %sample, existing = %existing, "metric sample name collision");
            return Err(Error::NameCollision {
                name: name.to_string(),
                sample: sample.clone(),
                existing,
            });
        }

        let help = help
            .map(str::to_string)
            .or_else(|| state.descriptions.remove(name));
        debug!(metric = name, kind = %kind, labels = ?shape.names(), "registering metric");
        let family = Arc::new(Family::new(name.to_string(), help, shape, aggregation));
        let idx = state.families.len();
        state.families.push(Arc::clone(&family));
        state.index.insert(name.to_string(), idx);
        state
            .emitted
            .extend(samples.into_iter().map(|sample| (sample, idx)));
        Ok(family)
    }

    /// Attach help text to `name`, now if it exists or at creation otherwise.
    /// Help text that is already set is kept.
    pub fn describe(&self, name: &str, help: &str) {
        let mut state = self.shared.lock();
        if let Some(&idx) = state.index.get(name) {
            state.families[idx].describe(help);
            return;
        }
        state
            .descriptions
            .entry(name.to_string())
            .or_insert_with(|| help.to_string());
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        let state = self.shared.lock();
        state.index.get(name).map(|&idx| state.families[idx].kind())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the state of every metric, in registration order.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.shared.lock();
        MetricsSnapshot {
            families: state.families.iter().map(|f| f.snapshot()).collect(),
        }
    }

    /// Render every metric as Prometheus text exposition.
    ///
    /// Values are copied under the structural lock; formatting happens after
    /// it is released.
    pub fn get_metrics(&self) -> String {
        self.snapshot().render()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Registry")
            .field(
                "metrics",
                &state.families.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Sample names a family of `kind` writes in the exposition.
fn sample_names(name: &str, kind: MetricKind) -> Vec<String> {
    match kind {
        MetricKind::Counter | MetricKind::Gauge => vec![name.to_string()],
        MetricKind::Histogram => vec![
            name.to_string(),
            format!("{name}{BUCKET_SUFFIX}"),
            format!("{name}{SUM_SUFFIX}"),
            format!("{name}{COUNT_SUFFIX}"),
        ],
        MetricKind::Summary => vec![
            name.to_string(),
            format!("{name}{SUM_SUFFIX}"),
            format!("{name}{COUNT_SUFFIX}"),
        ],
        MetricKind::Info => vec![format!("{name}{INFO_SUFFIX}")],
    }
}

fn same_parameters(a: &Aggregation, b: &Aggregation) -> bool {
    match (a, b) {
        (Aggregation::Histogram { bounds: x }, Aggregation::Histogram { bounds: y }) => x == y,
        (
            Aggregation::Summary { quantiles: x, .. },
            Aggregation::Summary { quantiles: y, .. },
        ) => x == y,
        _ => true,
    }
}
