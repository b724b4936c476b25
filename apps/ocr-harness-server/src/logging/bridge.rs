//! Tracing bridge
//!
//! A `tracing_subscriber` layer that copies the server's own `tracing`
//! events into the event log, so warnings and errors emitted anywhere in the
//! application show up in the log panel and in error reports.

use std::cell::Cell;
use std::fmt::Write as _;

use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use harness_log::{component_from_path, Details, LogLevel};

use super::{EventLogger, ECHO_TARGET};

/// Never forwarded: the logger's own echo and its observer diagnostics
const IGNORED_TARGETS: &[&str] = &[ECHO_TARGET, "ocr_harness_server::logging"];

const CAPTURED_PREFIX: &str = "ocr_harness_server";

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

pub struct TracingBridge {
    logger: EventLogger,
    min_level: Level,
}

impl TracingBridge {
    pub fn new(logger: EventLogger) -> Self {
        Self {
            logger,
            min_level: Level::INFO,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    fn should_forward(&self, level: &Level, target: &str) -> bool {
        // More verbose levels compare greater
        if *level > self.min_level {
            return false;
        }
        if !target.starts_with(CAPTURED_PREFIX) {
            return false;
        }
        !IGNORED_TARGETS.contains(&target)
    }
}

fn map_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

impl<S> Layer<S> for TracingBridge
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.should_forward(metadata.level(), metadata.target()) {
            return;
        }
        if FORWARDING.with(Cell::get) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if visitor.message.is_empty() {
            visitor.message = metadata.name().to_string();
        }

        let component = metadata
            .module_path()
            .and_then(|module| module.rsplit("::").next())
            .map(String::from)
            .unwrap_or_else(|| component_from_path(metadata.file().unwrap_or_default()));

        let mut details = visitor.fields;
        details.insert("module".to_string(), json!(metadata.module_path()));
        details.insert("file".to_string(), json!(metadata.file()));
        details.insert("line".to_string(), json!(metadata.line()));

        FORWARDING.with(|flag| flag.set(true));
        self.logger
            .record_from(&component, map_level(metadata.level()), visitor.message, Some(details));
        FORWARDING.with(|flag| flag.set(false));
    }
}

/// Collects the `message` field and any structured fields of an event
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Details,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.insert(field, json!(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.insert(field, json!(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_log::{LogConfig, LogFilter};
    use tracing_subscriber::layer::SubscriberExt;

    fn logger() -> EventLogger {
        EventLogger::with_environment(LogConfig::default(), Details::new())
    }

    #[test]
    fn test_forwards_application_events() {
        let logger = logger();
        let subscriber = tracing_subscriber::registry().with(TracingBridge::new(logger.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(filename = "scan.pdf", pages = 3_u64, password = "hunter2", "Invalid JSON config provided");
            tracing::debug!("too verbose to forward");
        });

        let entries = logger.query(&LogFilter::default());
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.message, "Invalid JSON config provided");
        assert_eq!(entry.component, "tests");

        let details = entry.details.as_ref().unwrap();
        assert_eq!(details["filename"], json!("scan.pdf"));
        assert_eq!(details["pages"], json!(3));
        assert!(!details.contains_key("password"));
        assert!(details.contains_key("line"));
    }

    #[test]
    fn test_ignores_echo_and_foreign_targets() {
        let logger = logger();
        let subscriber = tracing_subscriber::registry().with(TracingBridge::new(logger.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: ECHO_TARGET, "echoed entry");
            tracing::error!(target: "hyper::proto", "connection reset");
            // Recording emits an echo event, which must not be forwarded again
            logger.error("recorded directly", None);
        });

        let messages: Vec<String> = logger
            .query(&LogFilter::default())
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["recorded directly"]);
    }

    #[test]
    fn test_min_level() {
        let bridge = TracingBridge::new(logger()).with_min_level(Level::DEBUG);
        assert!(bridge.should_forward(&Level::DEBUG, "ocr_harness_server::routes::logs"));
        assert!(!bridge.should_forward(&Level::TRACE, "ocr_harness_server::routes::logs"));
        assert!(!bridge.should_forward(&Level::ERROR, "ocr_harness_server::logging"));
        assert!(!bridge.should_forward(&Level::ERROR, ECHO_TARGET));
    }
}
