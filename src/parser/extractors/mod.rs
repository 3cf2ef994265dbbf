//! Per-subsystem field extractors and their registration table
//!
//! Each subsystem owns an ordered slice of [`Extractor`]s. The router tries
//! them top to bottom and the first `Matched` wins, so a later, looser
//! pattern still gets a chance when an earlier one declines because a
//! captured number failed to parse.

pub mod cleanup;
pub mod delivery;
pub mod postscreen;
pub mod qmgr;
pub mod smtpd;

use crate::metrics::Metric;
use crate::parser::{Extraction, MetricEffect};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;

/// A named, pure pattern matcher for one event shape.
#[derive(Clone, Copy)]
pub struct Extractor {
    pub name: &'static str,
    pub extract: fn(&str) -> Extraction,
}

impl Extractor {
    pub const fn new(name: &'static str, extract: fn(&str) -> Extraction) -> Self {
        Self { name, extract }
    }

    pub fn run(&self, message: &str) -> Extraction {
        (self.extract)(message)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor").field("name", &self.name).finish()
    }
}

static REGISTRY: Lazy<HashMap<&'static str, &'static [Extractor]>> = Lazy::new(|| {
    HashMap::from([
        ("cleanup", cleanup::EXTRACTORS),
        ("lmtp", delivery::LMTP_EXTRACTORS),
        ("pipe", delivery::PIPE_EXTRACTORS),
        ("postscreen", postscreen::EXTRACTORS),
        ("qmgr", qmgr::EXTRACTORS),
        ("smtp", delivery::SMTP_EXTRACTORS),
        ("smtpd", smtpd::EXTRACTORS),
    ])
});

/// Ordered extractors registered for a subsystem, if any.
pub fn extractors_for(subsystem: &str) -> Option<&'static [Extractor]> {
    REGISTRY.get(subsystem).copied()
}

pub fn registered_subsystems() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Parse a captured group as an integer. `None` when the group is missing or
/// does not fit, which demotes the attempt to `Unmatched`.
pub(crate) fn capture_int<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name)?.as_str().parse().ok()
}

/// `<trust> TLS connection established (to|from) <peer>: <protocol> with
/// cipher <cipher> (<secret>/<algorithm> bits)`, trailing key-exchange details
/// ignored.
pub(crate) fn tls_connection(pattern: &Regex, message: &str, metric: Metric) -> Extraction {
    let Some(caps) = pattern.captures(message) else {
        return Extraction::Unmatched;
    };
    let (Some(secret_bits), Some(algorithm_bits)) = (
        capture_int::<u32>(&caps, "secret"),
        capture_int::<u32>(&caps, "algorithm"),
    ) else {
        return Extraction::Unmatched;
    };

    Extraction::single(MetricEffect::IncrementLabeled(
        metric,
        vec![
            caps["trust"].to_string(),
            caps["protocol"].to_string(),
            caps["cipher"].to_string(),
            secret_bits.to_string(),
            algorithm_bits.to_string(),
        ],
    ))
}

/// Three-digit SMTP reply code out of a `reject:` line.
pub(crate) fn reject_code(pattern: &Regex, message: &str, metric: Metric) -> Extraction {
    let Some(caps) = pattern.captures(message) else {
        return Extraction::Unmatched;
    };
    match capture_int::<u16>(&caps, "code") {
        Some(code) if (200..600).contains(&code) => {
            Extraction::single(MetricEffect::IncrementLabeled(metric, vec![code.to_string()]))
        }
        _ => Extraction::Unmatched,
    }
}
