//! Prometheus text exposition (format version 0.0.4).
//!
//! Each family renders as an optional `# HELP` line, a `# TYPE` line and
//! its sample lines. Histogram buckets and summary quantiles get the
//! synthetic `le` / `quantile` label appended after the caller's labels.
//! A family without series renders only its HELP/TYPE lines.

use std::fmt::{self, Write};

use crate::{
    definitions::{
        BUCKET_LABEL, BUCKET_SUFFIX, COUNT_SUFFIX, INFO_SUFFIX, QUANTILE_LABEL, SUM_SUFFIX,
    },
    labels::LabelSet,
    metric::MetricKind,
    snapshot::{FamilySnapshot, MetricsSnapshot, SampleValue},
};

/// Render a snapshot. Every line, including the last, ends with `\n`.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = render_into(&mut output, snapshot);
    output
}

/// Render a snapshot into any formatter sink.
pub fn render_into<W: Write>(output: &mut W, snapshot: &MetricsSnapshot) -> fmt::Result {
    for family in &snapshot.families {
        render_family(output, family)?;
    }
    Ok(())
}

fn render_family<W: Write>(output: &mut W, family: &FamilySnapshot) -> fmt::Result {
    // The text grammar has no info type: expose `<name>_info` as a gauge.
    let (name, type_str) = match family.kind {
        MetricKind::Info => (format!("{}{INFO_SUFFIX}", family.name), "gauge"),
        kind => (family.name.clone(), kind.as_str()),
    };

    if let Some(help) = &family.help {
        writeln!(output, "# HELP {name} {}", escape_help(help))?;
    }
    writeln!(output, "# TYPE {name} {type_str}")?;

    for series in &family.series {
        let labels = &series.labels;
        match &series.value {
            SampleValue::Counter { value } | SampleValue::Gauge { value } => {
                write_sample(output, &name, "", labels, None, &format_value(*value))?;
            },
            SampleValue::Histogram {
                buckets,
                sum,
                count,
            } => {
                for bucket in buckets {
                    let le = format_value(bucket.upper_bound);
                    write_sample(
                        output,
                        &name,
                        BUCKET_SUFFIX,
                        labels,
                        Some((BUCKET_LABEL, &le)),
                        &bucket.cumulative_count.to_string(),
                    )?;
                }
                write_sample(
                    output,
                    &name,
                    BUCKET_SUFFIX,
                    labels,
                    Some((BUCKET_LABEL, "+Inf")),
                    &count.to_string(),
                )?;
                write_sample(output, &name, SUM_SUFFIX, labels, None, &format_value(*sum))?;
                write_sample(output, &name, COUNT_SUFFIX, labels, None, &count.to_string())?;
            },
            SampleValue::Summary {
                quantiles,
                sum,
                count,
            } => {
                for q in quantiles {
                    let quantile = format_value(q.quantile);
                    write_sample(
                        output,
                        &name,
                        "",
                        labels,
                        Some((QUANTILE_LABEL, &quantile)),
                        &format_value(q.value),
                    )?;
                }
                write_sample(output, &name, SUM_SUFFIX, labels, None, &format_value(*sum))?;
                write_sample(output, &name, COUNT_SUFFIX, labels, None, &count.to_string())?;
            },
            SampleValue::Info => {
                write_sample(output, &name, "", labels, None, "1")?;
            },
        }
    }
    Ok(())
}

fn write_sample<W: Write>(
    output: &mut W,
    name: &str,
    suffix: &str,
    labels: &LabelSet,
    extra: Option<(&str, &str)>,
    value: &str,
) -> fmt::Result {
    write!(output, "{name}{suffix}")?;
    write_labels(output, labels, extra)?;
    writeln!(output, " {value}")
}

fn write_labels<W: Write>(
    output: &mut W,
    labels: &LabelSet,
    extra: Option<(&str, &str)>,
) -> fmt::Result {
    if labels.is_empty() && extra.is_none() {
        return Ok(());
    }

    output.write_char('{')?;
    for (i, (key, value)) in labels.iter().chain(extra).enumerate() {
        if i > 0 {
            output.write_char(',')?;
        }
        write!(output, "{key}=\"{}\"", escape_label_value(value))?;
    }
    output.write_char('}')
}

/// Escape a label value: backslash, double quote and line feed.
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape HELP text: backslash and line feed.
pub fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Canonical sample value text: `NaN`, `+Inf`, `-Inf`, otherwise the
/// shortest decimal that round-trips (`5`, `30.5`).
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
