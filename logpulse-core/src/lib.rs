pub mod config;
pub mod error;
pub mod parser;
pub mod record;

pub use config::PulseConfig;
pub use error::{ParseError, PulseError};
pub use parser::LineParser;
pub use record::LogRecord;
