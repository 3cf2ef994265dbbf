use crate::config::FileSourceConfig;
use crate::error::{ExporterError, Result};
use crate::source::{LineBuffer, LogSource};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

/// Follows a log file from its current end, surviving rotation and
/// truncation.
///
/// Reads go through `fill_buf`/`consume` and partial lines accumulate in
/// `pending`, so a cancelled `next_line` resumes exactly where it stopped.
pub struct FileTailSource {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes consumed from the currently open file.
    offset: u64,
    inode: Option<u64>,
    pending: LineBuffer,
    poll_interval: Duration,
    rotation_grace: Duration,
    missing_since: Option<Instant>,
}

enum FileChange {
    Unchanged,
    Truncated,
    Rotated,
}

impl FileTailSource {
    /// Open `config.path` positioned at its end; nothing already in the file
    /// is replayed.
    pub async fn open(config: &FileSourceConfig) -> Result<Self> {
        let file = File::open(&config.path)
            .await
            .map_err(|e| failure(&config.path, format!("cannot open: {}", e)))?;
        let inode = file.metadata().await.ok().as_ref().and_then(file_id);

        let mut reader = BufReader::new(file);
        let offset = reader
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| failure(&config.path, format!("cannot seek to end: {}", e)))?;

        info!(path = %config.path.display(), offset, "tailing log file");

        Ok(Self {
            path: config.path.clone(),
            reader,
            offset,
            inode,
            pending: LineBuffer::default(),
            poll_interval: config.poll_interval(),
            rotation_grace: config.rotation_grace(),
            missing_since: None,
        })
    }

    /// Called at EOF: compare the path on disk with the open file.
    async fn detect_change(&mut self) -> Result<FileChange> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let since = *self.missing_since.get_or_insert_with(Instant::now);
                if since.elapsed() > self.rotation_grace {
                    return Err(failure(
                        &self.path,
                        format!("file missing for more than {:?}", self.rotation_grace),
                    ));
                }
                debug!(path = %self.path.display(), "log file missing, waiting for it to reappear");
                return Ok(FileChange::Unchanged);
            }
            Err(e) => return Err(failure(&self.path, format!("cannot stat: {}", e))),
        };
        self.missing_since = None;

        let inode = file_id(&metadata);
        if inode.is_some() && inode != self.inode {
            return Ok(FileChange::Rotated);
        }
        if metadata.len() < self.offset {
            return Ok(FileChange::Truncated);
        }
        Ok(FileChange::Unchanged)
    }

    async fn reopen_from_start(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| failure(&self.path, format!("cannot reopen after rotation: {}", e)))?;
        self.inode = file.metadata().await.ok().as_ref().and_then(file_id);
        self.reader = BufReader::new(file);
        self.offset = 0;
        Ok(())
    }

    async fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| failure(&self.path, format!("cannot rewind after truncation: {}", e)))?;
        self.offset = 0;
        self.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl LogSource for FileTailSource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            let available = self
                .reader
                .fill_buf()
                .await
                .map_err(|e| failure(&self.path, format!("read failed: {}", e)))?;

            if available.is_empty() {
                match self.detect_change().await? {
                    FileChange::Rotated => {
                        info!(path = %self.path.display(), "log file rotated, reopening");
                        self.reopen_from_start().await?;
                        // The old file ended without a newline; emit what it had
                        if !self.pending.is_empty() {
                            return Ok(Some(self.pending.take()));
                        }
                    }
                    FileChange::Truncated => {
                        warn!(path = %self.path.display(), offset = self.offset, "log file truncated, rewinding");
                        self.rewind().await?;
                    }
                    FileChange::Unchanged => tokio::time::sleep(self.poll_interval).await,
                }
                continue;
            }

            let (consumed, line) = self.pending.push(available);
            self.reader.consume(consumed);
            self.offset += consumed as u64;

            if line.is_some() {
                return Ok(line);
            }
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn failure(path: &Path, message: String) -> ExporterError {
    ExporterError::source_failure(format!("file:{}", path.display()), message)
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}
