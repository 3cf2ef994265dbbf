use crate::metrics::Metric;
use crate::parser::extractors::Extractor;
use crate::parser::{Extraction, MetricEffect};
use once_cell::sync::Lazy;
use regex::Regex;

pub const EXTRACTORS: &[Extractor] = &[
    Extractor::new("message_id", message_id),
    Extractor::new("reject", reject),
    Extractor::new("not_accepted", not_accepted),
];

static MESSAGE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Za-z]+: (?:resent-)?message-id=").expect("cleanup message-id pattern is valid")
});

static REJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]+: reject: ").expect("cleanup reject pattern is valid"));

// milter-reject is reported by the milter, not by a cleanup header/body check
static NOT_ACCEPTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Za-z]+: (?:discard|milter-reject|milter-discard): |\bmessage not accepted\b")
        .expect("cleanup not-accepted pattern is valid")
});

fn message_id(message: &str) -> Extraction {
    if MESSAGE_ID.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::CleanupProcesses))
    } else {
        Extraction::Unmatched
    }
}

fn reject(message: &str) -> Extraction {
    if REJECT.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::CleanupRejects))
    } else {
        Extraction::Unmatched
    }
}

fn not_accepted(message: &str) -> Extraction {
    if NOT_ACCEPTED.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::CleanupNotAccepted))
    } else {
        Extraction::Unmatched
    }
}
