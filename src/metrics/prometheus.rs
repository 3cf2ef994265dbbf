//! Prometheus-backed metric sink
//!
//! Writes go through the `metrics` facade, so the sink itself holds no state:
//! the installed recorder owns every series and its atomics make scrapes safe
//! while the consumer keeps writing.

use crate::error::Result;
use crate::metrics::{registry, Metric, MetricSink};
use ::metrics::Label;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Sink that records into whichever `metrics` recorder is current.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusSink;

impl PrometheusSink {
    pub fn new() -> Self {
        Self
    }
}

impl MetricSink for PrometheusSink {
    fn increment(&self, metric: Metric) {
        ::metrics::counter!(metric.name()).increment(1);
    }

    fn observe(&self, metric: Metric, value: f64) {
        ::metrics::histogram!(metric.name()).record(value);
    }

    fn increment_labeled(&self, metric: Metric, labels: &[String]) {
        if let Some(labels) = key_labels(metric, labels) {
            ::metrics::counter!(metric.name(), labels).increment(1);
        }
    }

    fn observe_labeled(&self, metric: Metric, labels: &[String], value: f64) {
        if let Some(labels) = key_labels(metric, labels) {
            ::metrics::histogram!(metric.name(), labels).record(value);
        }
    }
}

/// Pair label values with the metric's schema. A mismatched arity is a bug in
/// an extractor; it is logged and the write dropped.
fn key_labels(metric: Metric, values: &[String]) -> Option<Vec<Label>> {
    let names = metric.labels();
    if names.len() != values.len() {
        warn!(
            metric = metric.id(),
            expected = names.len(),
            got = values.len(),
            "label arity mismatch, dropping observation"
        );
        return None;
    }

    Some(
        names
            .iter()
            .zip(values)
            .map(|(name, value)| Label::new(*name, value.clone()))
            .collect(),
    )
}

/// A builder with the bucket layout of every histogram in the catalog.
pub fn prometheus_builder() -> Result<PrometheusBuilder> {
    let mut builder = PrometheusBuilder::new();
    for metric in Metric::ALL {
        let doc = metric.doc();
        if let Some(buckets) = doc.buckets {
            builder = builder.set_buckets_for_metric(Matcher::Full(doc.name.to_string()), buckets)?;
        }
    }
    Ok(builder)
}

/// Install the Prometheus recorder globally and register the catalog.
///
/// The returned handle renders the exposition text for the scrape endpoint.
pub fn install() -> Result<PrometheusHandle> {
    let handle = prometheus_builder()?.install_recorder()?;
    info!("Prometheus recorder installed");

    registry::register_all_metrics();
    Ok(handle)
}
