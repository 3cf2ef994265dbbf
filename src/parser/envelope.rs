use once_cell::sync::Lazy;
use regex::Regex;

/// `<timestamp> <host> <process>[<pid>]: <message>` in either the classic
/// syslog timestamp or an RFC 3339 one.
static ENVELOPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<timestamp>[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\S+)\s+(?P<host>\S+)\s+(?P<process>[^\s\[\]]+)\[(?P<pid>\d+)\]:\s?(?P<message>.*)$",
    )
    .expect("envelope pattern is valid")
});

/// The syslog header of one line. Borrowed from the line, never copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub timestamp: &'a str,
    pub hostname: &'a str,
    /// Everything before `[pid]:`, e.g. `postfix/submission/smtpd`.
    pub process: &'a str,
    pub pid: u32,
    pub message: &'a str,
}

impl<'a> Envelope<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        let caps = ENVELOPE.captures(line)?;
        let pid = caps.name("pid")?.as_str().parse().ok()?;

        Some(Envelope {
            timestamp: caps.name("timestamp")?.as_str(),
            hostname: caps.name("host")?.as_str(),
            process: caps.name("process")?.as_str(),
            pid,
            message: caps.name("message")?.as_str(),
        })
    }

    /// Last path component of the process name; the routing key.
    pub fn subsystem(&self) -> &'a str {
        self.process.rsplit('/').next().unwrap_or(self.process)
    }
}
