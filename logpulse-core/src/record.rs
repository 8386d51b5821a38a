use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Fully parsed representation of one access-log line.
///
/// A record exists only if every mandatory field parsed — partial records
/// are never constructed. The numeric fields `bytes_sent`, `upstream_time`
/// and `request_time` are lenient: a `-` or otherwise unparseable value in
/// the source text becomes zero rather than failing the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Request instant, re-anchored into the configured time zone.
    pub timestamp: DateTime<FixedOffset>,
    pub bytes_sent: u64,
    /// Normalized request path — query string and fragment stripped.
    pub path: String,
    pub method: String,
    pub scheme: String,
    /// Three-character status code, kept as text.
    pub status: String,
    pub upstream_time: f64,
    pub request_time: f64,
}
