//! Line router: envelope split plus first-match dispatch to the extractors
//! registered for the line's subsystem.

use crate::constants::UNKNOWN_PROCESS;
use crate::parser::{extractors_for, Envelope, Extraction, MetricEffect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// No `process[pid]:` header.
    Envelope,
    /// Nothing registered for the subsystem.
    UnknownSubsystem,
    /// Every registered extractor declined.
    NoExtractorMatched,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route<'a> {
    Matched {
        envelope: Envelope<'a>,
        extractor: &'static str,
        effects: Vec<MetricEffect>,
    },
    Unmatched {
        /// Subsystem of the line, or `unknown` when the envelope failed.
        process: &'a str,
        reason: UnmatchedReason,
    },
}

pub fn route(line: &str) -> Route<'_> {
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(envelope) = Envelope::parse(line) else {
        return Route::Unmatched {
            process: UNKNOWN_PROCESS,
            reason: UnmatchedReason::Envelope,
        };
    };

    let subsystem = envelope.subsystem();
    let Some(extractors) = extractors_for(subsystem) else {
        return Route::Unmatched {
            process: subsystem,
            reason: UnmatchedReason::UnknownSubsystem,
        };
    };

    for extractor in extractors {
        if let Extraction::Matched(effects) = extractor.run(envelope.message) {
            return Route::Matched {
                envelope,
                extractor: extractor.name,
                effects,
            };
        }
    }

    Route::Unmatched {
        process: subsystem,
        reason: UnmatchedReason::NoExtractorMatched,
    }
}
