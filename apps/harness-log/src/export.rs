//! Export formats
//!
//! - `json`: the entries as a pretty-printed JSON array
//! - `txt`: one block per entry, `[timestamp] LEVEL - component: message`,
//!   followed by an indented `Details:` line when details are present,
//!   blocks separated by a blank line

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::LogEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Txt,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported export format: {0} (expected json or txt)")]
pub struct ExportFormatError(pub String);

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Txt => "text/plain; charset=utf-8",
        }
    }

    /// Attachment filename, e.g. `backend-logs-2024-05-01T10:00:00.000Z.json`
    pub fn attachment_filename(&self, prefix: &str, now: DateTime<Utc>) -> String {
        format!(
            "{}-logs-{}.{}",
            prefix,
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.extension()
        )
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "txt" => Ok(ExportFormat::Txt),
            other => Err(ExportFormatError(other.to_string())),
        }
    }
}

/// Render `entries` in `format`. Deterministic for a given sequence.
pub fn render<'a>(entries: impl Iterator<Item = &'a LogEntry>, format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => {
            let entries: Vec<&LogEntry> = entries.collect();
            // Serializing plain data into a String cannot fail
            serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
        }
        ExportFormat::Txt => entries.map(text_block).collect::<Vec<_>>().join("\n\n"),
    }
}

fn text_block(entry: &LogEntry) -> String {
    let mut block = format!(
        "[{}] {} - {}: {}",
        timestamp(&entry.timestamp),
        entry.level,
        entry.component,
        entry.message
    );

    if let Some(details) = entry.details.as_ref().filter(|d| !d.is_empty()) {
        let json = serde_json::to_string_pretty(details).unwrap_or_else(|_| "{}".to_string());
        block.push_str("\n  Details: ");
        block.push_str(&json);
    }

    block
}

/// The same rendering the JSON export uses
fn timestamp(ts: &DateTime<Utc>) -> String {
    match serde_json::to_value(ts) {
        Ok(serde_json::Value::String(s)) => s,
        _ => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}
