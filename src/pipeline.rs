//! Single consumer loop: pull lines from the source in order and classify
//! them until the source ends, fails, or shutdown is signalled.

use crate::engine::{LogLineEngine, Outcome};
use crate::error::Result;
use crate::source::LogSource;
use tokio::sync::watch;
use tracing::{error, info, instrument};

/// Line counts for one pipeline run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines: u64,
    pub matched: u64,
    pub unmatched: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &Outcome<'_>) {
        self.lines += 1;
        if outcome.is_matched() {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
    }
}

/// Drive `source` through `engine`.
///
/// Shutdown is checked before every read and wins over a ready line, so the
/// line being classified when it fires is finished but no further line is
/// started. A dropped shutdown sender counts as shutdown.
#[instrument(skip_all, fields(source = %source.describe()))]
pub async fn run(
    source: &mut dyn LogSource,
    engine: &LogLineEngine,
    mut shutdown: watch::Receiver<bool>,
) -> Result<PipelineStats> {
    info!("consuming log lines");
    let mut stats = PipelineStats::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = source.next_line() => match next {
                Ok(Some(line)) => {
                    let outcome = engine.classify(&line);
                    stats.record(&outcome);
                }
                Ok(None) => {
                    info!("log source reached end of stream");
                    break;
                }
                Err(e) => {
                    error!(error = %e, lines = stats.lines, "log source failed");
                    return Err(e);
                }
            },
        }
    }

    info!(
        lines = stats.lines,
        matched = stats.matched,
        unmatched = stats.unmatched,
        "log consumer stopped"
    );
    Ok(stats)
}
