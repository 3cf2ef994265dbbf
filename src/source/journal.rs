use crate::config::JournalSourceConfig;
use crate::error::{ExporterError, Result};
use crate::source::{LineBuffer, LogSource};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::info;

/// Follows the systemd journal through a `journalctl --follow` child process.
///
/// The child is killed when the source is dropped. `journalctl` exiting is
/// a terminal error since a follow never ends on its own. Output is decoded
/// lossily, so a message with invalid UTF-8 still arrives as a line.
pub struct JournalSource {
    child: Child,
    reader: BufReader<ChildStdout>,
    pending: LineBuffer,
    description: String,
}

impl JournalSource {
    /// The `journalctl` invocation for `config`, without stdio wiring.
    pub fn command(config: &JournalSourceConfig) -> Command {
        let mut command = Command::new(&config.journalctl_path);
        command
            .arg("--follow")
            .arg("--output=short")
            .arg("--no-pager")
            .arg("--quiet");
        match &config.cursor {
            Some(cursor) => command.arg(format!("--after-cursor={}", cursor)),
            None => command.arg("--lines=0"),
        };
        for unit in &config.units {
            command.arg(format!("--unit={}", unit));
        }
        command
    }

    pub fn open(config: &JournalSourceConfig) -> Result<Self> {
        let description = format!("journal:{}", config.units.join(","));

        let mut child = Self::command(config)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExporterError::source_failure(
                    description.clone(),
                    format!("cannot spawn {}: {}", config.journalctl_path.display(), e),
                )
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ExporterError::source_failure(description.clone(), "journalctl stdout not captured")
        })?;

        info!(units = ?config.units, cursor = ?config.cursor, "following systemd journal");

        Ok(Self {
            child,
            reader: BufReader::new(stdout),
            pending: LineBuffer::default(),
            description,
        })
    }
}

#[async_trait]
impl LogSource for JournalSource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await.map_err(|e| {
                ExporterError::source_failure(self.description.clone(), format!("read failed: {}", e))
            })?;

            if available.is_empty() {
                if !self.pending.is_empty() {
                    return Ok(Some(self.pending.take()));
                }
                let status = self
                    .child
                    .wait()
                    .await
                    .map(|status| status.to_string())
                    .unwrap_or_else(|e| e.to_string());
                return Err(ExporterError::source_failure(
                    self.description.clone(),
                    format!("journalctl exited ({})", status),
                ));
            }

            let (consumed, line) = self.pending.push(available);
            self.reader.consume(consumed);
            if line.is_some() {
                return Ok(line);
            }
        }
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
