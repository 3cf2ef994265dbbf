use crate::metrics::Metric;
use crate::parser::extractors::{capture_int, Extractor};
use crate::parser::{Extraction, MetricEffect};
use once_cell::sync::Lazy;
use regex::Regex;

pub const EXTRACTORS: &[Extractor] = &[
    Extractor::new("removed", removed),
    Extractor::new("insert", insert),
];

static REMOVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]+: removed\s*$").expect("qmgr removed pattern is valid"));

static INSERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Za-z]+: from=<[^>]*>, size=(?P<size>\d+), nrcpt=(?P<nrcpt>\d+)")
        .expect("qmgr insert pattern is valid")
});

/// `AAB4D259B1: removed`
fn removed(message: &str) -> Extraction {
    if REMOVED.is_match(message) {
        Extraction::single(MetricEffect::Increment(Metric::QmgrRemoves))
    } else {
        Extraction::Unmatched
    }
}

/// `AAB4D259B1: from=<sender>, size=1234, nrcpt=2 (queue active)`
fn insert(message: &str) -> Extraction {
    let Some(caps) = INSERT.captures(message) else {
        return Extraction::Unmatched;
    };
    match (capture_int::<u64>(&caps, "size"), capture_int::<u64>(&caps, "nrcpt")) {
        (Some(size), Some(nrcpt)) => Extraction::matched(vec![
            MetricEffect::Observe(Metric::QmgrInsertsSize, size as f64),
            MetricEffect::Observe(Metric::QmgrInsertsNrcpt, nrcpt as f64),
        ]),
        _ => Extraction::Unmatched,
    }
}
