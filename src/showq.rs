//! Queue snapshot from the Postfix `showq` service
//!
//! Unlike everything else this exporter publishes, queue contents are not in
//! the log stream. They are read from the showq socket on every scrape and
//! rendered as a fresh snapshot, so a message that left the queue stops being
//! counted on the next scrape.
//!
//! Two output formats exist. Postfix 3.x speaks a NUL separated attribute
//! protocol; older releases print the familiar `mailq` table.

use crate::config::ShowqConfig;
use crate::error::{ExporterError, Result};
use chrono::{DateTime, Datelike, Local, Month, NaiveDate, TimeZone};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_SHOWQ_PATH: &str = "/var/spool/postfix/public/showq";

pub const MESSAGE_SIZE_METRIC: &str = "postfix_showq_message_size_bytes";
pub const MESSAGE_AGE_METRIC: &str = "postfix_showq_message_age_seconds";
pub const UP_METRIC: &str = "postfix_up";

const SIZE_BUCKETS: &[f64] = &[1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9];
const AGE_BUCKETS: &[f64] = &[1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8];

/// Upper bound on one showq reply
const MAX_SHOWQ_BYTES: u64 = 64 * 1024 * 1024;

/// How many leading bytes decide between the two formats
const FORMAT_SNIFF_BYTES: usize = 128;

const TEXT_QUEUES: &[&str] = &["active", "hold", "other"];
const BINARY_QUEUES: &[&str] = &["active", "deferred", "hold", "incoming", "maildrop"];

/// `A07A81514      5156 Tue Feb 14 13:13:54  MAILER-DAEMON`
static TEXT_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[0-9A-Za-z]+([*!]?) +(\d+) +\w{3} +(\w{3}) +(\d{1,2}) +(\d{1,2}):(\d{2}):(\d{2}) +",
    )
    .expect("showq message pattern is valid")
});

/// One queued message. Either value may be missing from a binary record.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub queue: String,
    pub size_bytes: Option<f64>,
    pub age_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Every queue that gets a series, including empty ones
    pub queues: BTreeSet<String>,
    pub messages: Vec<QueuedMessage>,
}

impl QueueSnapshot {
    fn seeded(queues: &[&str]) -> Self {
        Self {
            queues: queues.iter().map(|q| q.to_string()).collect(),
            messages: Vec::new(),
        }
    }

    fn push(&mut self, message: QueuedMessage) {
        self.queues.insert(message.queue.clone());
        self.messages.push(message);
    }

    pub fn count(&self, queue: &str) -> usize {
        self.messages.iter().filter(|m| m.queue == queue).count()
    }
}

/// Parse a complete showq reply, picking the format from its first bytes.
pub fn parse_showq(data: &[u8], now: DateTime<Local>) -> QueueSnapshot {
    let head = &data[..data.len().min(FORMAT_SNIFF_BYTES)];
    if head.contains(&0) {
        parse_binary(data, now)
    } else {
        parse_textual(&String::from_utf8_lossy(data), now)
    }
}

/// The `mailq` table. `*` marks the active queue, `!` the hold queue; all
/// other messages are reported under `other`.
pub fn parse_textual(text: &str, now: DateTime<Local>) -> QueueSnapshot {
    let mut snapshot = QueueSnapshot::seeded(TEXT_QUEUES);

    for line in text.lines() {
        let Some(caps) = TEXT_MESSAGE.captures(line) else {
            continue;
        };
        let queue = match &caps[1] {
            "*" => "active",
            "!" => "hold",
            _ => "other",
        };
        let size_bytes = caps[2].parse::<f64>().ok();
        let age_seconds = arrival_time(&caps, &now)
            .map(|arrived| (now - arrived).num_milliseconds() as f64 / 1000.0);
        if age_seconds.is_none() {
            debug!(line, "showq arrival time not understood");
        }

        snapshot.push(QueuedMessage {
            queue: queue.to_string(),
            size_bytes,
            age_seconds,
        });
    }

    snapshot
}

/// The table has no year. Take the latest one that does not put the message
/// in the future.
fn arrival_time(caps: &regex::Captures<'_>, now: &DateTime<Local>) -> Option<DateTime<Local>> {
    let month = caps[3].parse::<Month>().ok()?.number_from_month();
    let day = caps[4].parse::<u32>().ok()?;
    let hour = caps[5].parse::<u32>().ok()?;
    let minute = caps[6].parse::<u32>().ok()?;
    let second = caps[7].parse::<u32>().ok()?;

    [now.year(), now.year() - 1].into_iter().find_map(|year| {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        let arrived = Local.from_local_datetime(&naive).earliest()?;
        (arrived <= *now).then_some(arrived)
    })
}

/// Postfix 3.x attribute stream: `key\0value\0` pairs, an empty key ends a
/// message. `queue_name` names the queue, `time` is the arrival in unix
/// seconds.
pub fn parse_binary(data: &[u8], now: DateTime<Local>) -> QueueSnapshot {
    let mut snapshot = QueueSnapshot::seeded(BINARY_QUEUES);
    let now_seconds = now.timestamp_millis() as f64 / 1000.0;

    let mut current: Option<QueuedMessage> = None;
    let mut records = data.split(|b| *b == 0);

    while let Some(key) = records.next() {
        if key.is_empty() {
            if let Some(message) = current.take() {
                snapshot.push(message);
            }
            continue;
        }
        let Some(value) = records.next() else {
            break;
        };
        let value = String::from_utf8_lossy(value);
        let message = current.get_or_insert_with(|| QueuedMessage {
            queue: "unknown".to_string(),
            size_bytes: None,
            age_seconds: None,
        });

        match key {
            b"queue_name" => message.queue = value.into_owned(),
            b"size" => message.size_bytes = value.parse::<f64>().ok(),
            b"time" => {
                message.age_seconds = value.parse::<f64>().ok().map(|arrived| now_seconds - arrived)
            }
            _ => {}
        }
    }

    if let Some(message) = current {
        snapshot.push(message);
    }
    snapshot
}

/// Render a snapshot as exposition text. `None` means the read failed and
/// only `postfix_up 0` is written.
pub fn render_snapshot(snapshot: Option<&QueueSnapshot>, path: &str) -> Result<String> {
    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(MESSAGE_SIZE_METRIC.to_string()), SIZE_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full(MESSAGE_AGE_METRIC.to_string()), AGE_BUCKETS)?
        .build_recorder();
    let handle = recorder.handle();

    ::metrics::with_local_recorder(&recorder, || {
        ::metrics::describe_gauge!(UP_METRIC, "Whether scraping the Postfix showq service was successful.");
        ::metrics::gauge!(UP_METRIC, "path" => path.to_string())
            .set(if snapshot.is_some() { 1.0 } else { 0.0 });

        let Some(snapshot) = snapshot else {
            return;
        };

        ::metrics::describe_histogram!(
            MESSAGE_SIZE_METRIC,
            ::metrics::Unit::Bytes,
            "Size of messages in Postfix's message queue, in bytes."
        );
        ::metrics::describe_histogram!(
            MESSAGE_AGE_METRIC,
            ::metrics::Unit::Seconds,
            "Age of messages in Postfix's message queue, in seconds."
        );

        // Empty queues still get zero series
        for queue in &snapshot.queues {
            let _ = ::metrics::histogram!(MESSAGE_SIZE_METRIC, "queue" => queue.clone());
            let _ = ::metrics::histogram!(MESSAGE_AGE_METRIC, "queue" => queue.clone());
        }
        for message in &snapshot.messages {
            if let Some(size) = message.size_bytes {
                ::metrics::histogram!(MESSAGE_SIZE_METRIC, "queue" => message.queue.clone()).record(size);
            }
            if let Some(age) = message.age_seconds {
                ::metrics::histogram!(MESSAGE_AGE_METRIC, "queue" => message.queue.clone()).record(age);
            }
        }
    });

    Ok(handle.render())
}

/// Reads the showq socket on demand.
#[derive(Debug, Clone)]
pub struct ShowqCollector {
    path: PathBuf,
    timeout: Duration,
}

impl ShowqCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &ShowqConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.path).with_timeout(config.timeout()))
    }

    /// Connect, read the whole reply and parse it.
    pub async fn collect(&self) -> Result<QueueSnapshot> {
        let data = tokio::time::timeout(self.timeout, read_socket(&self.path))
            .await
            .map_err(|_| showq_error(&self.path, format!("no reply within {:?}", self.timeout)))??;
        Ok(parse_showq(&data, Local::now()))
    }

    /// Exposition text for one scrape. Failures are logged and reported
    /// through `postfix_up`, never to the scraper.
    pub async fn render(&self) -> String {
        let path = self.path.display().to_string();
        let snapshot = match self.collect().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %path, error = %e, "showq collection failed");
                None
            }
        };

        render_snapshot(snapshot.as_ref(), &path).unwrap_or_else(|e| {
            warn!(error = %e, "cannot render showq snapshot");
            String::new()
        })
    }
}

#[cfg(unix)]
async fn read_socket(path: &Path) -> Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|e| showq_error(path, format!("cannot connect: {}", e)))?;
    let mut data = Vec::new();
    stream
        .take(MAX_SHOWQ_BYTES)
        .read_to_end(&mut data)
        .await
        .map_err(|e| showq_error(path, format!("read failed: {}", e)))?;
    debug!(path = %path.display(), bytes = data.len(), "read showq reply");
    Ok(data)
}

#[cfg(not(unix))]
async fn read_socket(path: &Path) -> Result<Vec<u8>> {
    Err(showq_error(path, "unix sockets are not supported on this platform".to_string()))
}

fn showq_error(path: &Path, message: String) -> ExporterError {
    ExporterError::Showq(format!("{}: {}", path.display(), message))
}
