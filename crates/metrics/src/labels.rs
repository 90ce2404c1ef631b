//! Label sets, label shapes and the exposition name grammar.
//!
//! A [`LabelShape`] is declared once per metric and fixes the label *names*.
//! Each observation supplies a [`LabelSet`] carrying the *values*; the set is
//! the key that fans one metric out into many timeseries.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::error::{Error, Result};

/// Content-keyed set of `(name, value)` pairs identifying one timeseries.
///
/// Pairs are kept sorted by name, so two sets built from the same pairs in
/// a different order compare, hash and render identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    /// The label set of a dimension-less timeseries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a label set, rejecting a name that appears twice.
    pub fn new<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        pairs.sort();
        if let Some(dup) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(Error::DuplicateLabelName(dup[0].0.clone()));
        }
        Ok(Self { pairs })
    }

    /// Encode a struct of scalar fields into a label set.
    ///
    /// Strings are taken verbatim, numbers and booleans use their display
    /// form, `None` fields are skipped. Nested values are rejected.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json =
            serde_json::to_value(value).map_err(|e| Error::LabelConversion(e.to_string()))?;
        let fields = match json {
            serde_json::Value::Object(fields) => fields,
            other => {
                return Err(Error::LabelConversion(format!(
                    "expected a struct or map, got {other}"
                )));
            },
        };

        let mut pairs = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::LabelConversion(format!(
                        "field '{name}' is not a scalar: {other}"
                    )));
                },
            };
            pairs.push((name, value));
        }
        Self::new(pairs)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Look up the value of one label.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .binary_search_by(|(k, _)| k.as_str().cmp(name))
            .ok()
            .map(|i| self.pairs[i].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for LabelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The label names a metric accepts, fixed when the metric is created.
///
/// Declaration order is kept for display; comparison ignores it.
#[derive(Debug, Clone, Default)]
pub struct LabelShape {
    names: Vec<String>,
    sorted: Vec<String>,
}

impl LabelShape {
    /// A shape with no dimensions.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            if !is_valid_label_name(name) {
                return Err(Error::InvalidLabelName(name.clone()));
            }
        }

        let mut sorted = names.clone();
        sorted.sort();
        if let Some(dup) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DuplicateLabelName(dup[0].clone()));
        }
        Ok(Self { names, sorted })
    }

    /// The shape implied by an example label set.
    pub fn of(labels: &LabelSet) -> Result<Self> {
        Self::new(labels.names())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sorted.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    /// Whether `labels` carries exactly this shape's names.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        labels.len() == self.sorted.len() && labels.names().eq(self.sorted.iter().map(String::as_str))
    }

    pub(crate) fn check(&self, metric: &str, labels: &LabelSet) -> Result<()> {
        if self.matches(labels) {
            return Ok(());
        }
        Err(Error::LabelMismatch {
            name: metric.to_string(),
            expected: self.names.clone(),
            got: labels.names().map(str::to_string).collect(),
        })
    }
}

impl PartialEq for LabelShape {
    fn eq(&self, other: &Self) -> bool {
        self.sorted == other.sorted
    }
}

impl Eq for LabelShape {}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the `__` prefix reserved for
/// collector-internal labels.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Map an arbitrary string onto the metric name grammar by replacing
/// every invalid character with `_`.
pub fn sanitize_metric_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    name.chars()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                if c.is_ascii_alphabetic() || c == '_' || c == ':' {
                    c
                } else {
                    '_'
                }
            } else if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
