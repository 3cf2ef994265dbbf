/// Process label for lines whose syslog header could not be parsed.
pub const UNKNOWN_PROCESS: &str = "unknown";

/// Service name reported by the health endpoint and used as the log target.
pub const SERVICE_NAME: &str = "postfix_exporter";
