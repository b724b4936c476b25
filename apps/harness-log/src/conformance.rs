//! Behavioural checks shared by every [`EventSink`] implementation
//!
//! Each context runs [`run_all`] from its own tests so the browser and
//! server loggers are held to the same contract.

use serde_json::json;

use crate::buffer::{LogConfig, LogFilter};
use crate::entry::{Details, LogEntry, LogLevel};
use crate::export::ExportFormat;
use crate::sanitize::SENSITIVE_KEYS;
use crate::sink::EventSink;

/// Run every check against loggers produced by `make`
pub fn run_all<S, F>(make: F)
where
    S: EventSink,
    F: Fn(LogConfig) -> S,
{
    capacity_is_bounded(&make);
    eviction_keeps_most_recent(&make);
    sensitive_keys_never_stored(&make);
    clear_then_record(&make);
    json_export_round_trips(&make);
    level_filter_is_exact(&make);
    mixed_levels_scenario(&make);
    error_report_window(&make);
    sessions_are_unique(&make);
}

fn messages(entries: &[LogEntry]) -> Vec<String> {
    entries.iter().map(|e| e.message.clone()).collect()
}

pub fn capacity_is_bounded<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::with_max_logs(5));
    for i in 0..12 {
        sink.record_from("conformance", LogLevel::ALL[i % 4], &format!("m{i}"), None);
        assert!(sink.count() <= 5, "buffer grew to {} past capacity 5", sink.count());
    }
}

pub fn eviction_keeps_most_recent<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    for i in 0..=1000 {
        sink.record_from("conformance", LogLevel::Info, &format!("m{i}"), None);
    }

    let all = sink.query(&LogFilter::default());
    assert_eq!(all.len(), 1000);
    assert_eq!(all[0].message, "m1");
    let expected: Vec<String> = (1..=1000).map(|i| format!("m{i}")).collect();
    assert_eq!(messages(&all), expected);
}

pub fn sensitive_keys_never_stored<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    for key in SENSITIVE_KEYS {
        let mut details = Details::new();
        details.insert(key.to_string(), json!("secret-value"));
        details.insert("filename".to_string(), json!("scan.png"));
        let returned = sink.record_from("conformance", LogLevel::Info, key, Some(&details));
        assert!(!returned.details.as_ref().is_some_and(|d| d.contains_key(*key)));
    }

    for entry in sink.query(&LogFilter::default()) {
        let details = entry.details.unwrap_or_default();
        for key in SENSITIVE_KEYS {
            assert!(!details.contains_key(*key), "{key} stored in entry {}", entry.message);
        }
        assert_eq!(details.get("filename"), Some(&json!("scan.png")));
    }
}

pub fn clear_then_record<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    sink.record_from("conformance", LogLevel::Info, "before", None);
    sink.clear();
    assert!(sink.query(&LogFilter::default()).is_empty());

    sink.record_from("conformance", LogLevel::Info, "after", None);
    assert_eq!(sink.count(), 1);
}

pub fn json_export_round_trips<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    sink.record_from("upload", LogLevel::Info, "a", json!({ "pages": 3 }).as_object());
    sink.record_from("upload", LogLevel::Warning, "b", None);
    sink.record_from("upload", LogLevel::Error, "c", json!({ "password": "x" }).as_object());

    let parsed: Vec<LogEntry> = serde_json::from_str(&sink.export(ExportFormat::Json))
        .expect("json export parses as an entry array");
    assert_eq!(parsed.len(), sink.count());
    assert_eq!(parsed, sink.query(&LogFilter::default()));
}

pub fn level_filter_is_exact<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    assert!(sink.query(&LogFilter::level(LogLevel::Error)).is_empty());

    for (i, level) in LogLevel::ALL.iter().cycle().take(9).enumerate() {
        sink.record_from("conformance", *level, &format!("m{i}"), None);
    }
    for level in LogLevel::ALL {
        let matched = sink.query(&LogFilter::level(level));
        assert!(!matched.is_empty());
        assert!(matched.iter().all(|e| e.level == level));
    }
}

pub fn mixed_levels_scenario<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    sink.record_from("conformance", LogLevel::Info, "a", None);
    let returned =
        sink.record_from("conformance", LogLevel::Error, "b", json!({ "password": "x" }).as_object());
    sink.record_from("conformance", LogLevel::Error, "c", None);

    let errors = sink.query(&LogFilter::level(LogLevel::Error));
    assert_eq!(messages(&errors), vec!["b", "c"]);
    assert_eq!(errors[0].details, None);
    assert_eq!(errors[0], returned, "recorded entry differs from the stored one");
}

pub fn error_report_window<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let sink = make(LogConfig::default());
    for i in 0..12 {
        sink.record_from("conformance", LogLevel::Error, &format!("e{i}"), None);
    }
    sink.record_from("conformance", LogLevel::Info, "i", None);
    sink.record_from("conformance", LogLevel::Warning, "w", None);
    sink.record_from("conformance", LogLevel::Debug, "d", None);

    let report = sink.error_report(None);
    let expected: Vec<String> = (2..12).map(|i| format!("e{i}")).collect();
    assert_eq!(messages(&report.recent_errors), expected);
    assert_eq!(report.all_logs_count, 15);
    assert_eq!(report.session_id, sink.session_id());
}

pub fn sessions_are_unique<S: EventSink>(make: &impl Fn(LogConfig) -> S) {
    let a = make(LogConfig::default());
    let b = make(LogConfig::default());
    assert_ne!(a.session_id(), b.session_id());
}
