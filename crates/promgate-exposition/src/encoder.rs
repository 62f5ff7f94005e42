//! Text exposition encoder.
//!
//! Renders metric families into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use crate::error::{ExpositionError, ExpositionResult};
use crate::family::{
    is_valid_label_name, is_valid_metric_name, LabelPair, Metric, MetricFamilies, MetricFamily,
    MetricType, MetricValue,
};

/// Render all families, in map order.
pub fn encode(families: &MetricFamilies) -> ExpositionResult<Vec<u8>> {
    let mut out = String::new();
    for family in families.values() {
        encode_family(&mut out, family)?;
    }
    Ok(out.into_bytes())
}

/// Render one family: optional `# HELP`, `# TYPE`, then its series.
pub fn encode_family(out: &mut String, family: &MetricFamily) -> ExpositionResult<()> {
    let fail = |reason: String| ExpositionError::Encode {
        family: family.name.clone(),
        reason,
    };

    if !is_valid_metric_name(&family.name) {
        return Err(fail("invalid metric name".to_string()));
    }
    if family.metrics.is_empty() {
        return Err(fail("family has no metrics".to_string()));
    }

    if let Some(help) = &family.help {
        out.push_str(&format!("# HELP {} {}\n", family.name, escape_help(help)));
    }
    out.push_str(&format!("# TYPE {} {}\n", family.name, family.metric_type));

    for metric in &family.metrics {
        if let Some(bad) = metric.labels.iter().find(|l| !is_valid_label_name(&l.name)) {
            return Err(fail(format!("invalid label name {:?}", bad.name)));
        }
        encode_metric(out, family, metric).map_err(fail)?;
    }
    Ok(())
}

fn encode_metric(out: &mut String, family: &MetricFamily, metric: &Metric) -> Result<(), String> {
    let name = family.name.as_str();
    let ts = metric.timestamp_ms;

    match (family.metric_type, &metric.value) {
        (
            MetricType::Counter | MetricType::Gauge | MetricType::Untyped,
            MetricValue::Simple(value),
        ) => {
            write_sample(out, name, &metric.labels, None, *value, ts);
        }
        (MetricType::Histogram, MetricValue::Histogram(h)) => {
            let bucket_name = format!("{name}_bucket");
            let mut has_inf = false;
            for bucket in &h.buckets {
                has_inf |= bucket.upper_bound == f64::INFINITY;
                write_sample(
                    out,
                    &bucket_name,
                    &metric.labels,
                    Some(("le", bucket.upper_bound)),
                    bucket.cumulative_count,
                    ts,
                );
            }
            let count = h
                .count
                .or_else(|| h.buckets.last().map(|b| b.cumulative_count))
                .unwrap_or(0.0);
            if !has_inf {
                write_sample(
                    out,
                    &bucket_name,
                    &metric.labels,
                    Some(("le", f64::INFINITY)),
                    count,
                    ts,
                );
            }
            write_sample(out, &format!("{name}_sum"), &metric.labels, None, h.sum.unwrap_or(0.0), ts);
            write_sample(out, &format!("{name}_count"), &metric.labels, None, count, ts);
        }
        (MetricType::Summary, MetricValue::Summary(s)) => {
            for q in &s.quantiles {
                write_sample(out, name, &metric.labels, Some(("quantile", q.quantile)), q.value, ts);
            }
            write_sample(out, &format!("{name}_sum"), &metric.labels, None, s.sum.unwrap_or(0.0), ts);
            write_sample(out, &format!("{name}_count"), &metric.labels, None, s.count.unwrap_or(0.0), ts);
        }
        (ty, _) => {
            return Err(format!("series value does not match family type {ty}"));
        }
    }
    Ok(())
}

fn write_sample(
    out: &mut String,
    name: &str,
    labels: &[LabelPair],
    extra: Option<(&str, f64)>,
    value: f64,
    timestamp_ms: Option<i64>,
) {
    out.push_str(name);
    if !labels.is_empty() || extra.is_some() {
        out.push('{');
        let mut first = true;
        for label in labels {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(&format!("{}=\"{}\"", label.name, escape_label_value(&label.value)));
        }
        if let Some((extra_name, extra_value)) = extra {
            if !first {
                out.push(',');
            }
            out.push_str(&format!("{extra_name}=\"{}\"", format_value(extra_value)));
        }
        out.push('}');
    }
    out.push(' ');
    out.push_str(&format_value(value));
    if let Some(ts) = timestamp_ms {
        out.push_str(&format!(" {ts}"));
    }
    out.push('\n');
}

/// Sample values and `le`/`quantile` bounds.
pub(crate) fn format_value(value: f64) -> String {
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

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
