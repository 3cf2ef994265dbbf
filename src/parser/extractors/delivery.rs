//! Extractors for the delivery agents: `smtp`, `lmtp` and `pipe`
//!
//! All three log the same `to=<...>, relay=..., delays=a/b/c/d, status=...`
//! shape; only the histogram the delays land in differs. The SMTP client also
//! logs outbound TLS sessions and connection timeouts.

use crate::metrics::{Metric, DELAY_STAGES};
use crate::parser::delays::parse_delays;
use crate::parser::extractors::{tls_connection, Extractor};
use crate::parser::{Extraction, MetricEffect};
use once_cell::sync::Lazy;
use regex::Regex;

pub const SMTP_EXTRACTORS: &[Extractor] = &[
    Extractor::new("tls_connect", smtp_tls_connect),
    Extractor::new("delivery", smtp_delivery),
    Extractor::new("connection_timed_out", smtp_connection_timed_out),
];

pub const LMTP_EXTRACTORS: &[Extractor] = &[Extractor::new("delivery", lmtp_delivery)];

pub const PIPE_EXTRACTORS: &[Extractor] = &[Extractor::new("delivery", pipe_delivery)];

static DELIVERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Za-z]+: to=<[^>]*>,").expect("delivery pattern is valid")
});

static DELAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bdelays=(?P<delays>[^,\s]+)").expect("delays pattern is valid"));

static STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bstatus=(?P<status>[a-z]+)").expect("status pattern is valid"));

static TLS_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<trust>\S+) TLS connection established to \S+: (?P<protocol>\S+) with cipher (?P<cipher>\S+) \((?P<secret>\d+)/(?P<algorithm>\d+) bits\)",
    )
    .expect("smtp TLS pattern is valid")
});

static CONNECTION_TIMED_OUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^connect to \S+: Connection timed out").expect("smtp timeout pattern is valid")
});

/// `3F8E: to=<a@b>, relay=mx[192.0.2.1]:25, delay=1.2, delays=0.1/0/0.5/0.6, dsn=2.0.0, status=sent (250 ok)`
///
/// A bad delay tuple skips the four observations but a deferred status is
/// still counted.
fn delivery(message: &str, delays_metric: Metric, count_deferred: bool) -> Extraction {
    if !DELIVERY.is_match(message) {
        return Extraction::Unmatched;
    }

    let mut effects = Vec::with_capacity(5);

    if let Some(tuple) = DELAYS
        .captures(message)
        .and_then(|caps| parse_delays(&caps["delays"]).ok())
    {
        effects.extend(DELAY_STAGES.iter().zip(tuple.stages()).map(|(stage, value)| {
            MetricEffect::ObserveLabeled(delays_metric, vec![stage.to_string()], value)
        }));
    }

    if count_deferred {
        let deferred = STATUS
            .captures(message)
            .is_some_and(|caps| &caps["status"] == "deferred");
        if deferred {
            effects.push(MetricEffect::Increment(Metric::SmtpDeferreds));
        }
    }

    Extraction::matched(effects)
}

fn smtp_delivery(message: &str) -> Extraction {
    delivery(message, Metric::SmtpDelays, true)
}

fn lmtp_delivery(message: &str) -> Extraction {
    delivery(message, Metric::LmtpDelays, false)
}

fn pipe_delivery(message: &str) -> Extraction {
    delivery(message, Metric::PipeDelays, false)
}

/// `Verified TLS connection established to mx[192.0.2.1]:25: TLSv1.3 with cipher TLS_AES_256_GCM_SHA384 (256/256 bits) ...`
fn smtp_tls_connect(message: &str) -> Extraction {
    tls_connection(&TLS_TO, message, Metric::SmtpTlsConnects)
}

fn smtp_connection_timed_out(message: &str) -> Extraction {
    if CONNECTION_TIMED_OUT.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::SmtpConnectionTimedOut))
    } else {
        Extraction::Unmatched
    }
}
