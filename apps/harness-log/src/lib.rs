//! OCR Harness event log
//!
//! The contract shared by the browser and server loggers:
//! - `entry`: the [`LogEntry`] wire shape, levels and sources
//! - `sanitize`: the sensitive-key denylist applied to every entry
//! - `buffer`: the capacity-bounded FIFO with filtering
//! - `export`: `json` and `txt` renderings of a buffer
//! - `report`: diagnostic error reports
//! - `observer`: ordered subscriber registry
//! - `sink`: the [`EventSink`] trait each context implements

pub mod buffer;
pub mod entry;
pub mod export;
pub mod observer;
pub mod report;
pub mod sanitize;
pub mod sink;

#[cfg(any(test, feature = "testing"))]
pub mod conformance;

pub use buffer::{
    parse_limit, LogBuffer, LogConfig, LogFilter, DEFAULT_MAX_LOGS, DEFAULT_RECENT_ERROR_WINDOW,
};
pub use entry::{Details, LevelParseError, LogEntry, LogLevel, LogSource, UNKNOWN_COMPONENT};
pub use export::{ExportFormat, ExportFormatError};
pub use observer::{ObserverId, ObserverRegistry};
pub use report::{CurrentError, ErrorReport};
pub use sanitize::{component_from_path, sanitize, SENSITIVE_KEYS};
pub use sink::EventSink;
