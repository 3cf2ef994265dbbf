use anyhow::Result;
use postfix_exporter::metrics::{prometheus_builder, registry, PrometheusSink};
use postfix_exporter::LogLineEngine;
use std::sync::Arc;

const LINES: &[&str] = &[
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: AAB4D259B1: removed",
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: C2032259E6: removed",
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: B83C4257DC: removed",
    "Feb 22 03:20:57 mx postfix/postscreen[1234]: NOQUEUE: reject: RCPT from [1.2.3.4]:12345: 550 5.7.1 Service unavailable",
    "Feb 11 16:49:24 mx postfix/smtp[30582]: 4CF2D3F1A: to=<user@example.com>, relay=mx.example.com[1.2.3.4]:25, delay=0.12, delays=0.01/0.02/0.03/0.06, dsn=2.0.0, status=sent (250 2.0.0 OK)",
    "Feb 11 16:49:24 mx postfix/anvil[99]: statistics: max cache size 1",
];

#[test]
fn classified_lines_render_as_prometheus_text() -> Result<()> {
    let recorder = prometheus_builder()?.build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        registry::register_all_metrics();
        let engine = LogLineEngine::new(Arc::new(PrometheusSink::new()), true);
        for line in LINES {
            engine.classify(line);
        }
    });

    let rendered = handle.render();

    assert!(rendered.contains("postfix_qmgr_removes_total 3"), "{}", rendered);
    assert!(rendered.contains("postfix_postscreen_rejects_total{code=\"550\"} 1"));
    assert!(rendered.contains("postfix_unsupported_log_entries_total{process=\"anvil\"} 1"));
    assert!(rendered.contains("postfix_smtp_delays_seconds_count{stage=\"transmission\"} 1"));
    assert!(rendered.contains("postfix_smtp_delays_seconds_bucket{stage=\"queue_manager\",le=\"0.1\"} 1"));
    // Eagerly registered, still zero
    assert!(rendered.contains("postfix_smtpd_connects_total 0"));
    assert!(rendered.contains("# HELP postfix_qmgr_removes_total"));
    Ok(())
}

#[test]
fn label_arity_mismatch_is_dropped() -> Result<()> {
    use postfix_exporter::metrics::{Metric, MetricSink};

    let recorder = prometheus_builder()?.build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let sink = PrometheusSink::new();
        sink.increment_labeled(Metric::SmtpdRejects, &["550".to_string(), "extra".to_string()]);
        sink.increment_labeled(Metric::SmtpdRejects, &["451".to_string()]);
    });

    let rendered = handle.render();
    assert!(rendered.contains("postfix_smtpd_rejects_total{code=\"451\"} 1"));
    assert!(!rendered.contains("extra"));
    Ok(())
}
