//! Log entry types
//!
//! The wire shape shared by the browser and server loggers. Both contexts
//! serialize entries through these types, so a report captured in one can be
//! compared field-for-field with a report captured in the other.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Auxiliary key/value metadata attached to an entry
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the four level names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown log level: {0}")]
pub struct LevelParseError(pub String);

impl FromStr for LogLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "DEBUG" => Ok(LogLevel::Debug),
            other => Err(LevelParseError(other.to_string())),
        }
    }
}

/// Execution context that produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogSource {
    Frontend,
    Backend,
    Model,
    System,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Frontend => "FRONTEND",
            LogSource::Backend => "BACKEND",
            LogSource::Model => "MODEL",
            LogSource::System => "SYSTEM",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component label used when the originating unit cannot be determined
pub const UNKNOWN_COMPONENT: &str = "Unknown";

/// One observed event
///
/// Entries are never mutated after construction; the buffer only appends,
/// evicts from the front, or clears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub component: String,
    pub message: String,
    pub details: Option<Details>,
    pub session_id: String,
}

impl LogEntry {
    /// Build an entry stamped with a fresh id and the current time.
    ///
    /// `details` is stored as given; callers go through
    /// [`LogBuffer::record`](crate::LogBuffer::record), which sanitizes first.
    pub(crate) fn new(
        level: LogLevel,
        source: LogSource,
        component: String,
        message: String,
        details: Option<Details>,
        session_id: String,
    ) -> Self {
        let component = if component.trim().is_empty() {
            UNKNOWN_COMPONENT.to_string()
        } else {
            component
        };

        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            source,
            component,
            message,
            details,
            session_id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_round_trip_names() {
        for level in LogLevel::ALL {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("info".parse::<LogLevel>().is_err());
        assert!("CRITICAL".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry = LogEntry::new(
            LogLevel::Warning,
            LogSource::Backend,
            "process".to_string(),
            "Invalid JSON config provided".to_string(),
            None,
            "session-1".to_string(),
        );

        let value = serde_json::to_value(&entry).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["component", "details", "id", "level", "message", "sessionId", "source", "timestamp"]
        );
        assert_eq!(object["level"], json!("WARNING"));
        assert_eq!(object["source"], json!("BACKEND"));
        assert_eq!(object["details"], json!(null));
        assert_eq!(object["sessionId"], json!("session-1"));
        assert!(object["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_blank_component_becomes_unknown() {
        let entry = LogEntry::new(
            LogLevel::Info,
            LogSource::Frontend,
            "   ".to_string(),
            "m".to_string(),
            None,
            "s".to_string(),
        );
        assert_eq!(entry.component, UNKNOWN_COMPONENT);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = LogEntry::new(LogLevel::Info, LogSource::System, "a".into(), "a".into(), None, "s".into());
        let b = LogEntry::new(LogLevel::Info, LogSource::System, "a".into(), "a".into(), None, "s".into());
        assert_ne!(a.id, b.id);
    }
}
