//! Where log lines come from
//!
//! A [`LogSource`] yields raw lines in the order they were written. It may
//! suspend while waiting for more data, but it must keep any partially read
//! line inside itself so that dropping a pending `next_line` future (on
//! shutdown) never loses or splits a line. Retrying and reopening are the
//! source's business; an error it returns is terminal.

pub mod file;
pub mod journal;

pub use file::FileTailSource;
pub use journal::JournalSource;

use crate::config::SourceConfig;
use crate::error::Result;
use async_trait::async_trait;
use tracing::warn;

/// Longest line a source buffers before handing it on unterminated.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[async_trait]
pub trait LogSource: Send {
    /// The next complete line without its terminator, `None` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Open the configured source. Only one is active per process.
pub async fn open(config: &SourceConfig) -> Result<Box<dyn LogSource>> {
    match config {
        SourceConfig::File(file) => Ok(Box::new(FileTailSource::open(file).await?)),
        SourceConfig::Journal(journal) => Ok(Box::new(JournalSource::open(journal)?)),
    }
}

/// Assembles lines out of raw reads.
///
/// Bytes are decoded lossily, so invalid UTF-8 never fails a read. The
/// partial line lives here between reads, which keeps callers resumable
/// after a cancelled `next_line`.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Take bytes from `available` up to and including the first newline.
    ///
    /// Returns how many bytes were used and the finished line, if any. A line
    /// reaching [`MAX_LINE_BYTES`] without a newline is emitted as it stands.
    pub(crate) fn push(&mut self, available: &[u8]) -> (usize, Option<String>) {
        match available.iter().position(|b| *b == b'\n') {
            Some(newline) => {
                self.pending.extend_from_slice(&available[..newline]);
                (newline + 1, Some(self.take()))
            }
            None => {
                self.pending.extend_from_slice(available);
                if self.pending.len() >= MAX_LINE_BYTES {
                    warn!(
                        bytes = self.pending.len(),
                        limit = MAX_LINE_BYTES,
                        "line exceeds length limit, emitting it unterminated"
                    );
                    (available.len(), Some(self.take()))
                } else {
                    (available.len(), None)
                }
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn take(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&bytes);
        line.trim_end_matches('\r').to_string()
    }
}
