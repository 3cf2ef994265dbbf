//! Metrics registry for the exporter catalog
//!
//! Describes every metric to the installed recorder, creates the unlabeled
//! series eagerly so they scrape as zero before the first matching line, and
//! detects exported-name conflicts early.

use crate::metrics::{metrics_documentation, MetricDoc, MetricKind, DELAY_STAGES};
use std::collections::HashMap;
use tracing::{info, warn};

/// Register all metrics with the current recorder
pub fn register_all_metrics() {
    let mut all_metrics: HashMap<&'static str, MetricDoc> = HashMap::new();

    for doc in metrics_documentation() {
        if let Some(existing) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined by both '{}' and '{}'",
                doc.name, existing.id, doc.id
            );
            continue;
        }
        register_metric(&doc);
        all_metrics.insert(doc.name, doc);
    }

    info!("Registered {} metrics", all_metrics.len());

    if std::env::var("POSTFIX_EXPORTER_METRICS_DEBUG").is_ok() {
        log_metrics_summary(&all_metrics);
    }
}

fn register_metric(doc: &MetricDoc) {
    match doc.kind {
        MetricKind::Counter => {
            ::metrics::describe_counter!(doc.name, doc.help);
            let _ = ::metrics::counter!(doc.name);
        }
        MetricKind::CounterVec => {
            // Label values are only known once a line carries them
            ::metrics::describe_counter!(doc.name, doc.help);
        }
        MetricKind::Histogram => {
            ::metrics::describe_histogram!(doc.name, doc.help);
            let _ = ::metrics::histogram!(doc.name);
        }
        MetricKind::HistogramVec => {
            ::metrics::describe_histogram!(doc.name, doc.help);
            if matches!(doc.labels, ["stage"]) {
                for stage in DELAY_STAGES {
                    let _ = ::metrics::histogram!(doc.name, "stage" => stage);
                }
            }
        }
    }
}

/// Log a summary of all registered metrics for debugging
fn log_metrics_summary(all_metrics: &HashMap<&'static str, MetricDoc>) {
    info!("=== Metrics Registry Summary ===");

    let mut by_subsystem: HashMap<&str, Vec<&MetricDoc>> = HashMap::new();
    for doc in all_metrics.values() {
        by_subsystem
            .entry(subsystem_from_metric_name(doc.name))
            .or_default()
            .push(doc);
    }

    for (subsystem, metrics) in by_subsystem {
        info!("Subsystem '{}': {} metrics", subsystem, metrics.len());
        for metric in metrics {
            info!(
                "  - {} ({:?}, labels {:?}): {}",
                metric.name, metric.kind, metric.labels, metric.help
            );
        }
    }

    info!("=== End Metrics Summary ===");
}

/// Extract the subsystem from an exported name
/// (e.g., "postfix_smtpd_rejects_total" -> "smtpd")
fn subsystem_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("postfix_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_from_metric_name() {
        assert_eq!(subsystem_from_metric_name("postfix_smtpd_rejects_total"), "smtpd");
        assert_eq!(subsystem_from_metric_name("postfix_qmgr_inserts_size_bytes"), "qmgr");
        assert_eq!(subsystem_from_metric_name("postfix_unsupported_log_entries_total"), "unsupported");
        assert_eq!(subsystem_from_metric_name("invalid_metric_name"), "unknown");
    }

    #[test]
    fn test_registration_without_recorder() {
        // The no-op recorder accepts everything
        register_all_metrics();
    }
}
