//! Metric families and the typed handles callers update them through.
//!
//! A [`Family`] is one named metric: a fixed kind, label shape and help
//! text, plus a map from [`LabelSet`] to a per-series value record. Series
//! are created lazily the first time a label combination is observed and
//! live as long as the family. Nothing bounds how many distinct label sets
//! a family accumulates.
//!
//! Creating a series is a structural change and takes the owning registry's
//! structural lock, so it can never interleave with registration or
//! rendering. Updating an existing series only takes the family's read lock
//! and then touches that series alone.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    labels::{LabelSet, LabelShape},
    registry::Shared,
    snapshot::{BucketSnapshot, FamilySnapshot, QuantileSnapshot, SampleValue, SeriesSnapshot},
    value::{AtomicF64, HistogramState, SummaryState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Info,
}

impl MetricKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Kind-specific settings shared by every series of a family.
#[derive(Debug, Clone)]
pub(crate) enum Aggregation {
    Counter { initial: f64 },
    Gauge { initial: f64 },
    Histogram { bounds: Arc<[f64]> },
    Summary { quantiles: Arc<[f64]>, max_samples: usize },
    Info,
}

impl Aggregation {
    pub(crate) fn kind(&self) -> MetricKind {
        match self {
            Self::Counter { .. } => MetricKind::Counter,
            Self::Gauge { .. } => MetricKind::Gauge,
            Self::Histogram { .. } => MetricKind::Histogram,
            Self::Summary { .. } => MetricKind::Summary,
            Self::Info => MetricKind::Info,
        }
    }

    fn new_series(&self) -> Series {
        match self {
            Self::Counter { initial } => Series::Counter(AtomicF64::new(*initial)),
            Self::Gauge { initial } => Series::Gauge(AtomicF64::new(*initial)),
            Self::Histogram { bounds } => Series::Histogram {
                bounds: Arc::clone(bounds),
                state: Mutex::new(HistogramState::new(bounds.len())),
            },
            Self::Summary {
                quantiles,
                max_samples,
            } => Series::Summary {
                quantiles: Arc::clone(quantiles),
                state: Mutex::new(SummaryState::new(*max_samples)),
            },
            Self::Info => Series::Info,
        }
    }
}

/// The value record of one timeseries.
#[derive(Debug)]
pub(crate) enum Series {
    Counter(AtomicF64),
    Gauge(AtomicF64),
    Histogram {
        bounds: Arc<[f64]>,
        state: Mutex<HistogramState>,
    },
    Summary {
        quantiles: Arc<[f64]>,
        state: Mutex<SummaryState>,
    },
    Info,
}

impl Series {
    fn sample(&self) -> SampleValue {
        match self {
            Self::Counter(v) => SampleValue::Counter { value: v.get() },
            Self::Gauge(v) => SampleValue::Gauge { value: v.get() },
            Self::Histogram { bounds, state } => {
                let state = lock(state).clone();
                SampleValue::Histogram {
                    buckets: bounds
                        .iter()
                        .zip(state.cumulative())
                        .map(|(bound, count)| BucketSnapshot {
                            upper_bound: *bound,
                            cumulative_count: *count,
                        })
                        .collect(),
                    sum: state.sum(),
                    count: state.count(),
                }
            },
            Self::Summary { quantiles, state } => {
                let state = lock(state).clone();
                SampleValue::Summary {
                    quantiles: quantiles
                        .iter()
                        .zip(state.quantiles(quantiles))
                        .map(|(quantile, value)| QuantileSnapshot {
                            quantile: *quantile,
                            value,
                        })
                        .collect(),
                    sum: state.sum(),
                    count: state.count(),
                }
            },
            Self::Info => SampleValue::Info,
        }
    }

    fn as_scalar(&self) -> Option<&AtomicF64> {
        match self {
            Self::Counter(v) | Self::Gauge(v) => Some(v),
            _ => None,
        }
    }

    fn observe(&self, value: f64) {
        match self {
            Self::Histogram { bounds, state } => lock(state).observe(bounds, value),
            Self::Summary { state, .. } => lock(state).observe(value),
            _ => {},
        }
    }
}

/// One named metric and its timeseries.
#[derive(Debug)]
pub(crate) struct Family {
    name: String,
    help: OnceLock<String>,
    shape: LabelShape,
    aggregation: Aggregation,
    series: RwLock<BTreeMap<LabelSet, Arc<Series>>>,
}

impl Family {
    pub(crate) fn new(
        name: String,
        help: Option<String>,
        shape: LabelShape,
        aggregation: Aggregation,
    ) -> Self {
        let mut series = BTreeMap::new();
        // A dimension-less metric has exactly one series; expose it from the start.
        if shape.is_empty() && aggregation.kind() != MetricKind::Info {
            series.insert(LabelSet::empty(), Arc::new(aggregation.new_series()));
        }

        let cell = OnceLock::new();
        if let Some(help) = help {
            let _ = cell.set(help);
        }

        Self {
            name,
            help: cell,
            shape,
            aggregation,
            series: RwLock::new(series),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> MetricKind {
        self.aggregation.kind()
    }

    pub(crate) fn shape(&self) -> &LabelShape {
        &self.shape
    }

    pub(crate) fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    /// Attach help text unless the family already has some.
    pub(crate) fn describe(&self, help: &str) {
        let _ = self.help.set(help.to_string());
    }

    fn lookup(&self, labels: &LabelSet) -> Option<Arc<Series>> {
        read(&self.series).get(labels).cloned()
    }

    /// Caller must hold the registry's structural lock.
    fn insert(&self, labels: &LabelSet) -> Arc<Series> {
        let mut series = write(&self.series);
        Arc::clone(
            series
                .entry(labels.clone())
                .or_insert_with(|| Arc::new(self.aggregation.new_series())),
        )
    }

    /// Caller must hold the registry's structural lock.
    fn replace_all(&self, labels: &LabelSet) {
        let mut series = write(&self.series);
        series.clear();
        series.insert(labels.clone(), Arc::new(self.aggregation.new_series()));
    }

    pub(crate) fn snapshot(&self) -> FamilySnapshot {
        let series = read(&self.series)
            .iter()
            .map(|(labels, series)| SeriesSnapshot {
                labels: labels.clone(),
                value: series.sample(),
            })
            .collect();

        FamilySnapshot {
            name: self.name.clone(),
            help: self.help.get().cloned(),
            kind: self.kind(),
            series,
        }
    }
}

/// Shared plumbing behind every typed handle.
#[derive(Clone)]
struct Handle {
    family: Arc<Family>,
    shared: Arc<Shared>,
}

impl Handle {
    fn existing(&self, labels: &LabelSet) -> Option<Arc<Series>> {
        self.family.lookup(labels)
    }

    /// Resolve the series for `labels`, creating it on first use.
    fn series(&self, labels: &LabelSet) -> Result<Arc<Series>> {
        if let Some(series) = self.family.lookup(labels) {
            return Ok(series);
        }
        self.family.shape.check(&self.family.name, labels)?;
        let _structure = self.shared.lock();
        Ok(self.family.insert(labels))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.family.name)
            .field("kind", &self.family.kind())
            .field("labels", &self.family.shape.names())
            .finish()
    }
}

macro_rules! handle_common {
    ($handle:ident) => {
        impl $handle {
            pub(crate) fn new(family: Arc<Family>, shared: Arc<Shared>) -> Self {
                Self {
                    inner: Handle { family, shared },
                }
            }

            pub fn name(&self) -> &str {
                &self.inner.family.name
            }

            pub fn help(&self) -> Option<&str> {
                self.inner.family.help.get().map(String::as_str)
            }

            pub fn label_names(&self) -> &[String] {
                self.inner.family.shape.names()
            }

            /// Whether both handles refer to the same registered metric.
            pub fn same_metric(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.inner.family, &other.inner.family)
            }
        }
    };
}

/// Monotonic accumulator.
#[derive(Debug, Clone)]
pub struct Counter {
    inner: Handle,
}

handle_common!(Counter);

impl Counter {
    /// Add `amount` to the dimension-less series.
    pub fn increment(&self, amount: f64) -> Result<()> {
        self.increment_with(amount, &LabelSet::empty())
    }

    /// Add `amount` to the series for `labels`.
    ///
    /// Negative (and NaN) amounts are rejected and leave the counter as it was.
    pub fn increment_with(&self, amount: f64, labels: &LabelSet) -> Result<()> {
        if amount.is_nan() || amount < 0.0 {
            return Err(Error::NegativeIncrement {
                name: self.name().to_string(),
                amount,
            });
        }
        if let Some(v) = self.inner.series(labels)?.as_scalar() {
            v.add(amount);
        }
        Ok(())
    }

    pub fn inc(&self) -> Result<()> {
        self.increment(1.0)
    }

    /// Current value of an existing series.
    pub fn get(&self, labels: &LabelSet) -> Option<f64> {
        self.inner
            .existing(labels)
            .and_then(|s| s.as_scalar().map(AtomicF64::get))
    }

    /// Raise the series to `value` if it is currently lower.
    pub(crate) fn absolute_with(&self, value: f64, labels: &LabelSet) -> Result<()> {
        if let Some(v) = self.inner.series(labels)?.as_scalar() {
            v.fetch_max(value);
        }
        Ok(())
    }

    /// Put the series back to the counter's initial value.
    pub(crate) fn reset_with(&self, labels: &LabelSet) -> Result<()> {
        let initial = match self.inner.family.aggregation {
            Aggregation::Counter { initial } => initial,
            _ => 0.0,
        };
        if let Some(v) = self.inner.series(labels)?.as_scalar() {
            v.set(initial);
        }
        Ok(())
    }
}

/// Freely settable value.
#[derive(Debug, Clone)]
pub struct Gauge {
    inner: Handle,
}

handle_common!(Gauge);

impl Gauge {
    pub fn set(&self, value: f64) -> Result<()> {
        self.set_with(value, &LabelSet::empty())
    }

    pub fn set_with(&self, value: f64, labels: &LabelSet) -> Result<()> {
        if let Some(v) = self.inner.series(labels)?.as_scalar() {
            v.set(value);
        }
        Ok(())
    }

    pub fn increment(&self, delta: f64) -> Result<()> {
        self.increment_with(delta, &LabelSet::empty())
    }

    pub fn increment_with(&self, delta: f64, labels: &LabelSet) -> Result<()> {
        if let Some(v) = self.inner.series(labels)?.as_scalar() {
            v.add(delta);
        }
        Ok(())
    }

    pub fn decrement(&self, delta: f64) -> Result<()> {
        self.decrement_with(delta, &LabelSet::empty())
    }

    pub fn decrement_with(&self, delta: f64, labels: &LabelSet) -> Result<()> {
        self.increment_with(-delta, labels)
    }

    pub fn get(&self, labels: &LabelSet) -> Option<f64> {
        self.inner
            .existing(labels)
            .and_then(|s| s.as_scalar().map(AtomicF64::get))
    }
}

/// Bucketed distribution.
#[derive(Debug, Clone)]
pub struct Histogram {
    inner: Handle,
}

handle_common!(Histogram);

impl Histogram {
    pub fn observe(&self, value: f64) -> Result<()> {
        self.observe_with(value, &LabelSet::empty())
    }

    pub fn observe_with(&self, value: f64, labels: &LabelSet) -> Result<()> {
        self.inner.series(labels)?.observe(value);
        Ok(())
    }

    /// Finite bucket upper bounds, ascending.
    pub fn bounds(&self) -> &[f64] {
        match &self.inner.family.aggregation {
            Aggregation::Histogram { bounds } => &bounds[..],
            _ => &[],
        }
    }
}

/// Quantile-tracked distribution.
#[derive(Debug, Clone)]
pub struct Summary {
    inner: Handle,
}

handle_common!(Summary);

impl Summary {
    pub fn observe(&self, value: f64) -> Result<()> {
        self.observe_with(value, &LabelSet::empty())
    }

    pub fn observe_with(&self, value: f64, labels: &LabelSet) -> Result<()> {
        self.inner.series(labels)?.observe(value);
        Ok(())
    }

    pub fn quantiles(&self) -> &[f64] {
        match &self.inner.family.aggregation {
            Aggregation::Summary { quantiles, .. } => &quantiles[..],
            _ => &[],
        }
    }
}

/// A single label-set record with no numeric payload.
///
/// An info metric holds at most one label set; recording a new one
/// replaces the previous record.
#[derive(Debug, Clone)]
pub struct Info {
    inner: Handle,
}

handle_common!(Info);

impl Info {
    pub fn record(&self, labels: &LabelSet) -> Result<()> {
        self.inner.family.shape.check(&self.inner.family.name, labels)?;
        let _structure = self.inner.shared.lock();
        self.inner.family.replace_all(labels);
        Ok(())
    }

    /// The currently recorded label set.
    pub fn get(&self) -> Option<LabelSet> {
        read(&self.inner.family.series).keys().next().cloned()
    }
}
