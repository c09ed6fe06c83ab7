//! Conversion of gathered metric families into remote-write series.

use super::labels::ExtraLabels;
use crate::sender::{Label, METRIC_NAME_LABEL, Sample, TimeSeries, WriteRequest};
use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType};
use std::collections::BTreeMap;

const BUCKET_LABEL: &str = "le";
const QUANTILE_LABEL: &str = "quantile";
const EXPORTED_PREFIX: &str = "exported_";

/// Flattens `families` into one `WriteRequest`.
///
/// Every metric becomes one or more series carrying a single sample. Samples
/// without an explicit timestamp use `now_ms`. Extra labels override metric
/// labels of the same name; a differing metric value moves to
/// `exported_<name>` so distinct children stay distinct series. Each series'
/// labels are sorted by name.
pub fn to_write_request(
    families: &[MetricFamily],
    extra: &ExtraLabels,
    now_ms: i64,
) -> WriteRequest {
    let mut timeseries = Vec::new();
    for family in families {
        let name = family.name();
        for metric in &family.metric {
            let timestamp = if metric.has_timestamp_ms() {
                metric.timestamp_ms()
            } else {
                now_ms
            };
            let mut push = |suffix: &str, extra_label: Option<(&str, String)>, value: f64| {
                let series_name = format!("{name}{suffix}");
                timeseries.push(TimeSeries {
                    labels: series_labels(&series_name, &metric.label, extra_label, extra),
                    samples: vec![Sample { value, timestamp }],
                });
            };
            convert_metric(family.type_(), metric, &mut push);
        }
    }
    WriteRequest { timeseries }
}

fn convert_metric<F>(kind: MetricType, metric: &Metric, push: &mut F)
where
    F: FnMut(&str, Option<(&str, String)>, f64),
{
    match kind {
        MetricType::COUNTER => {
            if let Some(counter) = metric.counter.as_ref() {
                push("", None, counter.value());
            }
        }
        MetricType::GAUGE => {
            if let Some(gauge) = metric.gauge.as_ref() {
                push("", None, gauge.value());
            }
        }
        MetricType::UNTYPED => {
            if let Some(untyped) = metric.untyped.as_ref() {
                push("", None, untyped.value());
            }
        }
        MetricType::HISTOGRAM => {
            let Some(histogram) = metric.histogram.as_ref() else {
                return;
            };
            let mut saw_inf = false;
            for bucket in &histogram.bucket {
                let bound = bucket.upper_bound();
                saw_inf |= bound == f64::INFINITY;
                push(
                    "_bucket",
                    Some((BUCKET_LABEL, format_float(bound))),
                    bucket.cumulative_count() as f64,
                );
            }
            if !saw_inf {
                push(
                    "_bucket",
                    Some((BUCKET_LABEL, format_float(f64::INFINITY))),
                    histogram.sample_count() as f64,
                );
            }
            push("_sum", None, histogram.sample_sum());
            push("_count", None, histogram.sample_count() as f64);
        }
        MetricType::SUMMARY => {
            let Some(summary) = metric.summary.as_ref() else {
                return;
            };
            for quantile in &summary.quantile {
                push(
                    "",
                    Some((QUANTILE_LABEL, format_float(quantile.quantile()))),
                    quantile.value(),
                );
            }
            push("_sum", None, summary.sample_sum());
            push("_count", None, summary.sample_count() as f64);
        }
        #[allow(unreachable_patterns)]
        _ => {}
    }
}

fn series_labels(
    name: &str,
    metric_labels: &[LabelPair],
    extra_label: Option<(&str, String)>,
    extra: &ExtraLabels,
) -> Vec<Label> {
    let mut merged: BTreeMap<String, String> = metric_labels
        .iter()
        .filter(|l| !l.value().is_empty())
        .map(|l| (l.name().to_string(), l.value().to_string()))
        .collect();
    if let Some((label, value)) = extra_label {
        merged.insert(label.to_string(), value);
    }
    for label in extra.iter() {
        if let Some(previous) = merged.insert(label.name.clone(), label.value.clone())
            && previous != label.value
        {
            let mut exported = format!("{EXPORTED_PREFIX}{}", label.name);
            while merged.contains_key(&exported) {
                exported.insert_str(0, EXPORTED_PREFIX);
            }
            merged.insert(exported, previous);
        }
    }
    merged.insert(METRIC_NAME_LABEL.to_string(), name.to_string());

    merged
        .into_iter()
        .map(|(name, value)| Label { name, value })
        .collect()
}

/// Formats bucket bounds and quantiles the way the Prometheus text format
/// does (`+Inf`, `-Inf`, `NaN`, shortest decimal otherwise).
fn format_float(value: f64) -> String {
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
