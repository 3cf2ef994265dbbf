//! The log line engine: envelope parsing, routing and metric dispatch for one
//! line at a time.
//!
//! The engine keeps nothing between calls apart from the sink handle and the
//! unsupported-line switch, so `classify` may be called from anywhere that
//! owns a reference. Ordering is the caller's job: lines must be fed in the
//! order they were written.

use crate::config::Config;
use crate::metrics::{Metric, MetricSink};
use crate::router::{route, Route, UnmatchedReason};
use std::sync::Arc;
use tracing::{debug, trace};

/// What happened to one line. Every line gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'a> {
    Matched {
        subsystem: &'a str,
        extractor: &'static str,
        effects: usize,
    },
    Unmatched {
        process: &'a str,
        reason: UnmatchedReason,
        /// Whether `unsupported_log_entries` was incremented.
        counted: bool,
    },
}

impl Outcome<'_> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Outcome::Matched { .. })
    }
}

pub struct LogLineEngine {
    sink: Arc<dyn MetricSink>,
    log_unsupported_lines: bool,
}

impl LogLineEngine {
    pub fn new(sink: Arc<dyn MetricSink>, log_unsupported_lines: bool) -> Self {
        Self {
            sink,
            log_unsupported_lines,
        }
    }

    pub fn from_config(sink: Arc<dyn MetricSink>, config: &Config) -> Self {
        Self::new(sink, config.log_unsupported_lines)
    }

    pub fn log_unsupported_lines(&self) -> bool {
        self.log_unsupported_lines
    }

    /// Classify one raw line and apply its metric effects before returning.
    pub fn classify<'a>(&self, line: &'a str) -> Outcome<'a> {
        match route(line) {
            Route::Matched {
                envelope,
                extractor,
                effects,
            } => {
                for effect in &effects {
                    effect.apply(self.sink.as_ref());
                }
                trace!(
                    subsystem = envelope.subsystem(),
                    extractor,
                    effects = effects.len(),
                    "line matched"
                );
                Outcome::Matched {
                    subsystem: envelope.subsystem(),
                    extractor,
                    effects: effects.len(),
                }
            }
            Route::Unmatched { process, reason } => {
                if self.log_unsupported_lines {
                    self.sink
                        .increment_labeled(Metric::UnsupportedLogEntries, &[process.to_string()]);
                }
                debug!(process, ?reason, line = line.trim_end(), "unsupported log line");
                Outcome::Unmatched {
                    process,
                    reason,
                    counted: self.log_unsupported_lines,
                }
            }
        }
    }
}
