//! The operation set every logger context exposes

use crate::buffer::LogFilter;
use crate::entry::{Details, LogEntry, LogLevel};
use crate::export::ExportFormat;
use crate::report::{CurrentError, ErrorReport};

/// A logger bound to one execution context.
///
/// Implementations own a [`LogBuffer`](crate::LogBuffer) behind interior
/// mutability suited to their context, so every method takes `&self`. None
/// of the operations can fail.
pub trait EventSink {
    fn session_id(&self) -> String;

    fn record_from(
        &self,
        component: &str,
        level: LogLevel,
        message: &str,
        details: Option<&Details>,
    ) -> LogEntry;

    fn query(&self, filter: &LogFilter) -> Vec<LogEntry>;

    fn count(&self) -> usize;

    fn clear(&self);

    fn export(&self, format: ExportFormat) -> String;

    fn error_report(&self, current_error: Option<CurrentError>) -> ErrorReport;
}
