//! Line parsing: the syslog envelope, delay tuples and the per-subsystem
//! field extractors.
//!
//! Extractors are pure functions from a message remainder to an
//! [`Extraction`]. They never touch the sink; the engine applies the returned
//! effects, which keeps every pattern testable on its own.

pub mod delays;
pub mod envelope;
pub mod extractors;

pub use delays::{parse_delays, DelayParseError, DelayTuple};
pub use envelope::Envelope;
pub use extractors::{extractors_for, Extractor};

use crate::metrics::{Metric, MetricSink};

/// One primitive mutation of the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEffect {
    Increment(Metric),
    Observe(Metric, f64),
    IncrementLabeled(Metric, Vec<String>),
    ObserveLabeled(Metric, Vec<String>, f64),
}

impl MetricEffect {
    pub fn metric(&self) -> Metric {
        match self {
            MetricEffect::Increment(m)
            | MetricEffect::Observe(m, _)
            | MetricEffect::IncrementLabeled(m, _)
            | MetricEffect::ObserveLabeled(m, _, _) => *m,
        }
    }

    pub fn apply(&self, sink: &dyn MetricSink) {
        match self {
            MetricEffect::Increment(metric) => sink.increment(*metric),
            MetricEffect::Observe(metric, value) => sink.observe(*metric, *value),
            MetricEffect::IncrementLabeled(metric, labels) => {
                sink.increment_labeled(*metric, labels)
            }
            MetricEffect::ObserveLabeled(metric, labels, value) => {
                sink.observe_labeled(*metric, labels, *value)
            }
        }
    }
}

/// Result of trying one extractor against a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Never empty; see [`Extraction::matched`].
    Matched(Vec<MetricEffect>),
    Unmatched,
}

impl Extraction {
    /// A match with no effects is not a match.
    pub fn matched(effects: Vec<MetricEffect>) -> Self {
        if effects.is_empty() {
            Extraction::Unmatched
        } else {
            Extraction::Matched(effects)
        }
    }

    pub fn single(effect: MetricEffect) -> Self {
        Extraction::Matched(vec![effect])
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Extraction::Matched(_))
    }
}
