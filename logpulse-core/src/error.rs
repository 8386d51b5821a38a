use thiserror::Error;

/// Unified error type for LogPulse.
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal: {0}")]
    Internal(String),
}

/// Per-line parse failure.
///
/// Every variant carries the offending text so worker logs can show what
/// was dropped. A failed line is counted once and discarded — never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line does not match the access-log grammar at all.
    #[error("line does not match access-log grammar: {line:?}")]
    Structure { line: String },

    /// The bracketed timestamp could not be parsed.
    #[error("bad timestamp: {text:?}")]
    Timestamp { text: String },

    /// The quoted request line did not split into method, path, protocol.
    #[error("bad request line: {text:?}")]
    RequestLine { text: String },

    /// The request path token could not be parsed as a URL.
    #[error("bad request path: {text:?}")]
    Path { text: String },
}

impl ParseError {
    /// Short step label, used as a metrics/log dimension.
    pub fn step(&self) -> &'static str {
        match self {
            ParseError::Structure { .. } => "structure",
            ParseError::Timestamp { .. } => "timestamp",
            ParseError::RequestLine { .. } => "request_line",
            ParseError::Path { .. } => "path",
        }
    }
}
