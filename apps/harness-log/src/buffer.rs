//! Bounded log buffer
//!
//! A FIFO of [`LogEntry`] values capped at `max_logs`. Appending past the cap
//! evicts from the front, so the survivors are always the most recent
//! entries in insertion order. The buffer itself is not synchronized; each
//! execution context wraps it in whatever discipline it needs.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::entry::{Details, LogEntry, LogLevel, LogSource};
use crate::export::{self, ExportFormat};
use crate::report::{CurrentError, ErrorReport};
use crate::sanitize::sanitize;

/// Default capacity of a buffer
pub const DEFAULT_MAX_LOGS: usize = 1000;

/// Default number of ERROR entries carried by an error report
pub const DEFAULT_RECENT_ERROR_WINDOW: usize = 10;

/// Sizing of a log buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    pub max_logs: usize,
    pub recent_error_window: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_MAX_LOGS,
            recent_error_window: DEFAULT_RECENT_ERROR_WINDOW,
        }
    }
}

impl LogConfig {
    pub fn with_max_logs(max_logs: usize) -> Self {
        Self {
            max_logs,
            ..Self::default()
        }
    }
}

/// Retrieval predicates
///
/// All supplied predicates must match. `level` is kept as the caller's raw
/// string: a name that is not one of the four levels matches nothing rather
/// than failing the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogFilter {
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl LogFilter {
    pub fn level(level: LogLevel) -> Self {
        Self {
            level: Some(level.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build a filter from loosely typed input, such as an object handed over
    /// from JavaScript.
    ///
    /// Nothing here fails: a non-string level is kept in its JSON spelling
    /// and so matches nothing, and a limit that is not a number is ignored.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let session_id = object
            .get("sessionId")
            .or_else(|| object.get("session_id"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let level = match object.get("level") {
            None | Some(Value::Null) => None,
            Some(Value::String(level)) if level.is_empty() => None,
            Some(Value::String(level)) => Some(level.clone()),
            Some(other) => Some(other.to_string()),
        };

        let limit = match object.get("limit") {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(truncate_limit)),
            Some(Value::String(s)) => parse_limit(s),
            _ => None,
        };

        Self {
            session_id,
            level,
            limit,
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(session_id) = &self.session_id {
            if entry.session_id != *session_id {
                return false;
            }
        }

        if let Some(level) = &self.level {
            match level.parse::<LogLevel>() {
                Ok(level) if level == entry.level => {}
                _ => return false,
            }
        }

        true
    }

    /// Effective limit, clamped to `1..=max_logs`
    pub fn effective_limit(&self, max_logs: usize) -> Option<usize> {
        let max_logs = max_logs.max(1);
        self.limit
            .map(|limit| usize::try_from(limit.max(1)).unwrap_or(max_logs).min(max_logs))
    }
}

/// Parse a limit given as text. Fractions are truncated; anything that is
/// not a number yields `None`.
pub fn parse_limit(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(truncate_limit))
}

fn truncate_limit(limit: f64) -> Option<i64> {
    // `as` saturates at the i64 bounds
    limit.is_finite().then(|| limit.trunc() as i64)
}

/// Capacity-bounded, append-only sequence of entries for one session
#[derive(Debug, Clone)]
pub struct LogBuffer {
    config: LogConfig,
    source: LogSource,
    session_id: String,
    environment: Details,
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    /// Create a buffer with a fresh session id.
    ///
    /// `environment` is captured once here and carried into every error
    /// report of the session.
    pub fn new(config: LogConfig, source: LogSource, environment: Details) -> Self {
        let config = LogConfig {
            max_logs: config.max_logs.max(1),
            ..config
        };

        Self {
            config,
            source,
            session_id: Uuid::new_v4().to_string(),
            environment,
            entries: VecDeque::with_capacity(config.max_logs.min(DEFAULT_MAX_LOGS)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the whole buffer in insertion order
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.back().map(|entry| entry.timestamp)
    }

    /// Build, sanitize and append an entry, returning a copy of what was stored.
    pub fn record(
        &mut self,
        level: LogLevel,
        component: impl Into<String>,
        message: impl Into<String>,
        details: Option<&Details>,
    ) -> LogEntry {
        let entry = LogEntry::new(
            level,
            self.source,
            component.into(),
            message.into(),
            sanitize(details),
            self.session_id.clone(),
        );

        self.append(entry.clone());
        entry
    }

    /// Append an already-built entry, evicting the oldest past capacity.
    ///
    /// The entry's details are sanitized again so that nothing appended
    /// through this path can bypass the denylist.
    pub fn push(&mut self, mut entry: LogEntry) {
        entry.details = sanitize(entry.details.as_ref());
        self.append(entry);
    }

    fn append(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);

        while self.entries.len() > self.config.max_logs {
            self.entries.pop_front();
        }
    }

    /// Entries matching `filter`, in creation order.
    ///
    /// With a limit, only the most recent matches are kept.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let mut matched: Vec<LogEntry> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        if let Some(limit) = filter.effective_limit(self.config.max_logs) {
            if matched.len() > limit {
                matched.drain(..matched.len() - limit);
            }
        }

        matched
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize the entire buffer
    pub fn export(&self, format: ExportFormat) -> String {
        export::render(self.entries.iter(), format)
    }

    pub fn error_report(&self, current_error: Option<CurrentError>) -> ErrorReport {
        let window = self.config.recent_error_window;
        let errors: Vec<&LogEntry> = self.entries.iter().filter(|e| e.is_error()).collect();
        let recent_errors = errors[errors.len().saturating_sub(window)..]
            .iter()
            .map(|entry| (*entry).clone())
            .collect();

        ErrorReport {
            report_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
            current_error,
            recent_errors,
            all_logs_count: self.entries.len(),
            system_info: self.environment.clone(),
        }
    }
}
