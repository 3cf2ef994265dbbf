//! Metric catalog and the sink the log engine writes into
//!
//! Every metric the exporter exposes is a variant of [`Metric`]. Its exported
//! name, label schema, help text and buckets live in one table so the engine,
//! the registry and the Prometheus recorder all agree on a single definition.

pub mod prometheus;
pub mod registry;

pub use prometheus::{install, prometheus_builder, PrometheusSink};

/// Builds exported metric names with a consistent convention:
/// postfix_{id}_total for counters, postfix_{id}_{unit} for histograms
macro_rules! postfix_metric {
    (counter, $id:literal) => {
        concat!("postfix_", $id, "_total")
    };
    (histogram, $id:literal) => {
        concat!("postfix_", $id)
    };
    (histogram, $id:literal, $unit:literal) => {
        concat!("postfix_", $id, "_", $unit)
    };
}

/// Label values for the four stages of a `delays=a/b/c/d` tuple, in order.
pub const DELAY_STAGES: [&str; 4] = [
    "before_queue_manager",
    "queue_manager",
    "connection_setup",
    "transmission",
];

pub const DELAY_BUCKETS: &[f64] = &[1e-3, 1e-2, 1e-1, 1.0, 1e1, 1e2, 1e3, 1e4];
pub const SIZE_BUCKETS: &[f64] = &[1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9];
pub const NRCPT_BUCKETS: &[f64] = &[1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0];

const NO_LABELS: &[&str] = &[];
const STAGE_LABELS: &[&str] = &["stage"];
const CODE_LABELS: &[&str] = &["code"];
const TLS_LABELS: &[&str] = &["trust", "protocol", "cipher", "secret_bits", "algorithm_bits"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    CleanupProcesses,
    CleanupRejects,
    CleanupNotAccepted,
    QmgrInsertsNrcpt,
    QmgrInsertsSize,
    QmgrRemoves,
    SmtpDelays,
    LmtpDelays,
    PipeDelays,
    SmtpDeferreds,
    SmtpTlsConnects,
    SmtpConnectionTimedOut,
    SmtpdConnects,
    SmtpdDisconnects,
    SmtpdFcrdnsErrors,
    SmtpdLostConnections,
    SmtpdProcesses,
    SmtpdRejects,
    SmtpdSaslAuthenticationFailures,
    SmtpdTlsConnects,
    PostscreenRejects,
    UnsupportedLogEntries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    CounterVec,
    Histogram,
    HistogramVec,
}

impl MetricKind {
    pub fn is_histogram(self) -> bool {
        matches!(self, MetricKind::Histogram | MetricKind::HistogramVec)
    }

    pub fn is_vector(self) -> bool {
        matches!(self, MetricKind::CounterVec | MetricKind::HistogramVec)
    }
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    /// Stable identifier, independent of the exported name.
    pub id: &'static str,
    pub name: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub buckets: Option<&'static [f64]>,
}

impl Metric {
    pub const ALL: [Metric; 22] = [
        Metric::CleanupProcesses,
        Metric::CleanupRejects,
        Metric::CleanupNotAccepted,
        Metric::QmgrInsertsNrcpt,
        Metric::QmgrInsertsSize,
        Metric::QmgrRemoves,
        Metric::SmtpDelays,
        Metric::LmtpDelays,
        Metric::PipeDelays,
        Metric::SmtpDeferreds,
        Metric::SmtpTlsConnects,
        Metric::SmtpConnectionTimedOut,
        Metric::SmtpdConnects,
        Metric::SmtpdDisconnects,
        Metric::SmtpdFcrdnsErrors,
        Metric::SmtpdLostConnections,
        Metric::SmtpdProcesses,
        Metric::SmtpdRejects,
        Metric::SmtpdSaslAuthenticationFailures,
        Metric::SmtpdTlsConnects,
        Metric::PostscreenRejects,
        Metric::UnsupportedLogEntries,
    ];

    pub fn doc(self) -> MetricDoc {
        use MetricKind::*;

        let (id, name, kind, help, labels, buckets) =
            match self {
                Metric::CleanupProcesses => (
                    "cleanup_processes",
                    postfix_metric!(counter, "cleanup_processes"),
                    Counter,
                    "Total number of messages processed by cleanup",
                    NO_LABELS,
                    None,
                ),
                Metric::CleanupRejects => (
                    "cleanup_rejects",
                    postfix_metric!(counter, "cleanup_rejects"),
                    Counter,
                    "Total number of messages rejected by cleanup",
                    NO_LABELS,
                    None,
                ),
                Metric::CleanupNotAccepted => (
                    "cleanup_not_accepted",
                    postfix_metric!(counter, "cleanup_not_accepted"),
                    Counter,
                    "Total number of messages discarded or not accepted by cleanup",
                    NO_LABELS,
                    None,
                ),
                Metric::QmgrInsertsNrcpt => (
                    "qmgr_inserts_nrcpt",
                    postfix_metric!(histogram, "qmgr_inserts_nrcpt"),
                    Histogram,
                    "Number of recipients per message inserted into the mail queues",
                    NO_LABELS,
                    Some(NRCPT_BUCKETS),
                ),
                Metric::QmgrInsertsSize => (
                    "qmgr_inserts_size",
                    postfix_metric!(histogram, "qmgr_inserts_size", "bytes"),
                    Histogram,
                    "Size of messages inserted into the mail queues in bytes",
                    NO_LABELS,
                    Some(SIZE_BUCKETS),
                ),
                Metric::QmgrRemoves => (
                    "qmgr_removes",
                    postfix_metric!(counter, "qmgr_removes"),
                    Counter,
                    "Total number of messages removed from the mail queues",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpDelays => (
                    "smtp_delays",
                    postfix_metric!(histogram, "smtp_delays", "seconds"),
                    HistogramVec,
                    "SMTP message processing time in seconds per delivery stage",
                    STAGE_LABELS,
                    Some(DELAY_BUCKETS),
                ),
                Metric::LmtpDelays => (
                    "lmtp_delays",
                    postfix_metric!(histogram, "lmtp_delays", "seconds"),
                    HistogramVec,
                    "LMTP message processing time in seconds per delivery stage",
                    STAGE_LABELS,
                    Some(DELAY_BUCKETS),
                ),
                Metric::PipeDelays => (
                    "pipe_delays",
                    postfix_metric!(histogram, "pipe_delays", "seconds"),
                    HistogramVec,
                    "Pipe message processing time in seconds per delivery stage",
                    STAGE_LABELS,
                    Some(DELAY_BUCKETS),
                ),
                Metric::SmtpDeferreds => (
                    "smtp_deferreds",
                    postfix_metric!(counter, "smtp_deferreds"),
                    Counter,
                    "Total number of messages deferred by the SMTP client",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpTlsConnects => (
                    "smtp_tls_connects",
                    postfix_metric!(counter, "smtp_tls_connects"),
                    CounterVec,
                    "Total number of outgoing TLS connections",
                    TLS_LABELS,
                    None,
                ),
                Metric::SmtpConnectionTimedOut => (
                    "smtp_connection_timed_out",
                    postfix_metric!(counter, "smtp_connection_timed_out"),
                    Counter,
                    "Total number of outgoing connections that timed out",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpdConnects => (
                    "smtpd_connects",
                    postfix_metric!(counter, "smtpd_connects"),
                    Counter,
                    "Total number of incoming connections",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpdDisconnects => (
                    "smtpd_disconnects",
                    postfix_metric!(counter, "smtpd_disconnects"),
                    Counter,
                    "Total number of incoming disconnections",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpdFcrdnsErrors => (
                    "smtpd_fcrdns_errors",
                    postfix_metric!(counter, "smtpd_fcrdns_errors"),
                    Counter,
                    "Total number of forward-confirmed reverse DNS errors",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpdLostConnections => (
                    "smtpd_lost_connections",
                    postfix_metric!(counter, "smtpd_lost_connections"),
                    CounterVec,
                    "Total number of incoming connections lost or ended with failed commands",
                    &["reason"] as &[&str],
                    None,
                ),
                Metric::SmtpdProcesses => (
                    "smtpd_processes",
                    postfix_metric!(counter, "smtpd_processes"),
                    CounterVec,
                    "Total number of incoming messages handed to the queue, by SASL method",
                    &["type"] as &[&str],
                    None,
                ),
                Metric::SmtpdRejects => (
                    "smtpd_rejects",
                    postfix_metric!(counter, "smtpd_rejects"),
                    CounterVec,
                    "Total number of rejected incoming requests, by SMTP status code",
                    CODE_LABELS,
                    None,
                ),
                Metric::SmtpdSaslAuthenticationFailures => (
                    "smtpd_sasl_authentication_failures",
                    postfix_metric!(counter, "smtpd_sasl_authentication_failures"),
                    Counter,
                    "Total number of SASL authentication failures",
                    NO_LABELS,
                    None,
                ),
                Metric::SmtpdTlsConnects => (
                    "smtpd_tls_connects",
                    postfix_metric!(counter, "smtpd_tls_connects"),
                    CounterVec,
                    "Total number of incoming TLS connections",
                    TLS_LABELS,
                    None,
                ),
                Metric::PostscreenRejects => (
                    "postscreen_rejects",
                    postfix_metric!(counter, "postscreen_rejects"),
                    CounterVec,
                    "Total number of requests rejected by postscreen, by SMTP status code",
                    CODE_LABELS,
                    None,
                ),
                Metric::UnsupportedLogEntries => (
                    "unsupported_log_entries",
                    postfix_metric!(counter, "unsupported_log_entries"),
                    CounterVec,
                    "Log lines that could not be matched, by process",
                    &["process"] as &[&str],
                    None,
                ),
            };

        MetricDoc {
            id,
            name,
            kind,
            help,
            labels,
            buckets,
        }
    }

    pub fn id(self) -> &'static str {
        self.doc().id
    }

    /// Exported Prometheus name.
    pub fn name(self) -> &'static str {
        self.doc().name
    }

    pub fn kind(self) -> MetricKind {
        self.doc().kind
    }

    pub fn labels(self) -> &'static [&'static str] {
        self.doc().labels
    }

    pub fn from_id(id: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.id() == id)
    }
}

/// Documentation for every exported metric, in catalog order.
pub fn metrics_documentation() -> Vec<MetricDoc> {
    Metric::ALL.iter().map(|m| m.doc()).collect()
}

/// The capability set the log engine mutates.
///
/// Writes come from one sequential consumer. Implementations must still be
/// safe to read concurrently, since scrapes happen while lines are applied.
/// Labeled children are created on first use and never removed.
pub trait MetricSink: Send + Sync {
    fn increment(&self, metric: Metric);

    fn observe(&self, metric: Metric, value: f64);

    /// `labels` are values in the order of [`Metric::labels`].
    fn increment_labeled(&self, metric: Metric, labels: &[String]);

    fn observe_labeled(&self, metric: Metric, labels: &[String], value: f64);
}
