//! Extractors for the SMTP server (`smtpd`)
//!
//! Covers the connection lifecycle, SASL and FCrDNS warnings, recipient
//! rejects, queue hand-offs and inbound TLS.

use crate::metrics::Metric;
use crate::parser::extractors::{reject_code, tls_connection, Extractor};
use crate::parser::{Extraction, MetricEffect};
use once_cell::sync::Lazy;
use regex::Regex;

pub const EXTRACTORS: &[Extractor] = &[
    Extractor::new("connect", connect),
    Extractor::new("disconnect", disconnect),
    Extractor::new("lost_connection", lost_connection),
    Extractor::new("sasl_authentication_failure", sasl_authentication_failure),
    Extractor::new("fcrdns_error", fcrdns_error),
    Extractor::new("reject", reject),
    Extractor::new("client", client),
    Extractor::new("tls_connect", tls_connect),
];

static CONNECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^connect from \S+").expect("smtpd connect pattern is valid"));

static DISCONNECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^disconnect from \S+(?P<stats>.*)$").expect("smtpd disconnect pattern is valid")
});

static LOST_CONNECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^lost connection after (?P<stage>[\w-]+)(?: \(\d+ bytes\))? from ")
        .expect("smtpd lost connection pattern is valid")
});

// Postfix words this three ways depending on where the failure surfaced
static SASL_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^warning: (?:\S+: SASL \S+ authentication failed|SASL authentication failure: |.*\bcannot connect to saslauthd server)",
    )
    .expect("smtpd SASL pattern is valid")
});

static FCRDNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^warning: hostname \S+ does not resolve to address ")
        .expect("smtpd FCrDNS pattern is valid")
});

static REJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:NOQUEUE|[0-9A-Za-z]+): reject: [A-Z-]+ from \S+: (?P<code>\d+) ")
        .expect("smtpd reject pattern is valid")
});

static CLIENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]+: client=\S+").expect("smtpd client pattern is valid"));

static SASL_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r", sasl_method=(?P<method>[^,\s]+)").expect("smtpd sasl_method pattern is valid")
});

static TLS_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<trust>\S+) TLS connection established from \S+: (?P<protocol>\S+) with cipher (?P<cipher>\S+) \((?P<secret>\d+)/(?P<algorithm>\d+) bits\)",
    )
    .expect("smtpd TLS pattern is valid")
});

fn connect(message: &str) -> Extraction {
    if CONNECT.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::SmtpdConnects))
    } else {
        Extraction::Unmatched
    }
}

/// `disconnect from host[1.2.3.4] ehlo=1 auth=0/1 quit=1 commands=2/3`
///
/// Each command that failed at least once (`ok/total` with ok < total) is
/// counted as a lost-connection reason. The `commands=` summary is skipped.
fn disconnect(message: &str) -> Extraction {
    let Some(caps) = DISCONNECT.captures(message) else {
        return Extraction::Unmatched;
    };

    let mut effects = vec![MetricEffect::Increment(Metric::SmtpdDisconnects)];
    effects.extend(
        failed_commands(&caps["stats"]).map(|command| {
            MetricEffect::IncrementLabeled(Metric::SmtpdLostConnections, vec![command.to_string()])
        }),
    );
    Extraction::matched(effects)
}

fn failed_commands(stats: &str) -> impl Iterator<Item = &str> {
    stats.split_whitespace().filter_map(|token| {
        let (command, counts) = token.split_once('=')?;
        let (ok, total) = counts.split_once('/')?;
        let (ok, total) = (ok.parse::<u32>().ok()?, total.parse::<u32>().ok()?);
        (command != "commands" && ok < total).then_some(command)
    })
}

/// `lost connection after DATA (0 bytes) from host[1.2.3.4]`
fn lost_connection(message: &str) -> Extraction {
    match LOST_CONNECTION.captures(message) {
        Some(caps) => Extraction::single(MetricEffect::IncrementLabeled(
            Metric::SmtpdLostConnections,
            vec![caps["stage"].to_string()],
        )),
        None => Extraction::Unmatched,
    }
}

fn sasl_authentication_failure(message: &str) -> Extraction {
    if SASL_FAILURE.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::SmtpdSaslAuthenticationFailures))
    } else {
        Extraction::Unmatched
    }
}

fn fcrdns_error(message: &str) -> Extraction {
    if FCRDNS.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::SmtpdFcrdnsErrors))
    } else {
        Extraction::Unmatched
    }
}

/// `NOQUEUE: reject: RCPT from host[1.2.3.4]: 554 5.7.1 <x>: Relay access denied; ...`
fn reject(message: &str) -> Extraction {
    reject_code(&REJECT, message, Metric::SmtpdRejects)
}

/// `4F9D1300: client=host[1.2.3.4], sasl_method=PLAIN, sasl_username=alice`
fn client(message: &str) -> Extraction {
    if !CLIENT.is_match(message) {
        return Extraction::Unmatched;
    }
    let method = SASL_METHOD
        .captures(message)
        .map(|caps| caps["method"].to_string())
        .unwrap_or_default();
    Extraction::single(MetricEffect::IncrementLabeled(Metric::SmtpdProcesses, vec![method]))
}

fn tls_connect(message: &str) -> Extraction {
    tls_connection(&TLS_FROM, message, Metric::SmtpdTlsConnects)
}
