//! Diagnostic error reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{Details, LogEntry};

/// The failure active when a report was requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl CurrentError {
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        stack_trace: Option<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            stack_trace,
        }
    }
}

/// Diagnostic bundle of the recent failures of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub report_id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub current_error: Option<CurrentError>,
    /// Most recent ERROR entries, oldest first
    pub recent_errors: Vec<LogEntry>,
    pub all_logs_count: usize,
    pub system_info: Details,
}
