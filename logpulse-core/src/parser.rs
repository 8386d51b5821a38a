//! Stateless access-log line parser.
//!
//! One fixed grammar, 13 capture groups:
//!
//! ```text
//! <ip> <ident> <user> [<time>] <scheme> "<method> <path> <protocol>" \
//!     <status> <bytes> "<ref>" "<agent>" "<xff>" <upstreamTime> <requestTime>
//! ```
//!
//! A line either yields exactly one [`LogRecord`] or exactly one classified
//! [`ParseError`] — never both, never neither. The numeric fields `bytes`,
//! `upstreamTime` and `requestTime` are lenient: unparseable values (the `-`
//! placeholder in particular) default to zero instead of failing the line.

use crate::error::{ParseError, PulseError};
use crate::record::LogRecord;
use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;
use url::Url;

/// Grammar of one access-log line. 13 capture groups; a line that does not
/// match in full is a structural parse failure.
const LINE_PATTERN: &str = r#"([\d\.]+)\s+([^ \[]+)\s+([^ \[]+)\s+\[([^\]]+)\]\s+([a-z]+)\s+"([^"]+)"\s+(\d{3})\s+(\d+)\s+"([^"]+)"\s+"(.*?)"\s+"([\d\.-]+)"\s+([\d\.-]+)\s+([\d\.-]+)"#;

/// Timestamp layout: `21/Dec/2015:20:22:14 +0800`.
const TIME_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Stateless line parser. Cheap to clone — one per parser worker.
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
    zone: Tz,
    /// Dummy base for resolving the relative request-path token.
    base: Url,
}

impl LineParser {
    /// Build a parser that re-anchors timestamps into `timezone`
    /// (an IANA name such as `Asia/Shanghai`).
    pub fn new(timezone: &str) -> Result<Self, PulseError> {
        let zone: Tz = timezone
            .parse()
            .map_err(|_| PulseError::UnknownTimezone(timezone.to_string()))?;
        let pattern = Regex::new(LINE_PATTERN)
            .map_err(|e| PulseError::Internal(format!("line grammar regex: {e}")))?;
        let base = Url::parse("http://localhost/")
            .map_err(|e| PulseError::Internal(format!("base url: {e}")))?;
        Ok(Self { pattern, zone, base })
    }

    /// Parse one delimiter-stripped raw line.
    pub fn parse(&self, line: &[u8]) -> Result<LogRecord, ParseError> {
        let text = String::from_utf8_lossy(line);

        let caps = self.pattern.captures(&text).ok_or_else(|| ParseError::Structure {
            line: text.to_string(),
        })?;

        // 1. Bracketed timestamp — hard failure.
        let time_text = &caps[4];
        let timestamp = DateTime::parse_from_str(time_text, TIME_LAYOUT)
            .map_err(|_| ParseError::Timestamp {
                text: time_text.to_string(),
            })?
            .with_timezone(&self.zone)
            .fixed_offset();

        // 2. Byte count — lenient, zero on conversion failure.
        let bytes_sent = caps[8].parse::<u64>().unwrap_or(0);

        // 3. Request line must be exactly `<method> <path> <protocol>`.
        let request_line = &caps[6];
        let tokens: Vec<&str> = request_line.split(' ').collect();
        if tokens.len() != 3 {
            return Err(ParseError::RequestLine {
                text: request_line.to_string(),
            });
        }

        // 4. Path component only — query string and fragment discarded.
        let path = self
            .base
            .join(tokens[1])
            .map_err(|_| ParseError::Path {
                text: tokens[1].to_string(),
            })?
            .path()
            .to_string();

        // 5. Upstream/request timings — lenient like the byte count
        //    (`-` means the upstream was never consulted).
        let upstream_time = caps[12].parse::<f64>().unwrap_or(0.0);
        let request_time = caps[13].parse::<f64>().unwrap_or(0.0);

        Ok(LogRecord {
            timestamp,
            bytes_sent,
            path,
            method: tokens[0].to_string(),
            scheme: caps[5].to_string(),
            status: caps[7].to_string(),
            upstream_time,
            request_time,
        })
    }
}
