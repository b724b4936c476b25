//! Server-side event log
//!
//! [`EventLogger`] is the backend's handle to the shared log contract. It is
//! created once by the application setup and passed to everything that
//! records events: route handlers, the request middleware, the panic hook
//! and the tracing bridge.
//!
//! The buffer sits behind a mutex so append and evict happen atomically for
//! concurrent request tasks. Observers live under a separate lock and are
//! invoked after the buffer lock is released, each isolated with
//! `catch_unwind` so a failing observer cannot starve the others.

mod bridge;
mod environment;
pub mod interceptor;

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use harness_log::{
    component_from_path, CurrentError, Details, ErrorReport, EventSink, ExportFormat, LogBuffer,
    LogConfig, LogEntry, LogFilter, LogLevel, LogSource, ObserverId, ObserverRegistry,
};

pub use bridge::TracingBridge;
pub use environment::server_environment;

/// Target of the `tracing` echo emitted for every recorded entry
pub const ECHO_TARGET: &str = "ocr_harness_server::event_log";

/// Callback invoked with the full buffer after every record or clear
pub type Observer = Arc<dyn Fn(&[LogEntry]) + Send + Sync>;

thread_local! {
    static NOTIFYING: Cell<bool> = const { Cell::new(false) };
    static NOTIFY_PENDING: Cell<bool> = const { Cell::new(false) };
}

/// True while this thread is running observers
pub(crate) fn is_notifying() -> bool {
    NOTIFYING.with(Cell::get)
}

/// Build a details map from a `json!` object literal
pub fn details(value: serde_json::Value) -> Option<Details> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Shared handle to the backend event log
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<EventLoggerInner>,
}

struct EventLoggerInner {
    buffer: Mutex<LogBuffer>,
    observers: Mutex<ObserverRegistry<Observer>>,
}

impl EventLogger {
    /// Create a logger for this process, capturing the host environment
    pub fn new(config: LogConfig) -> Self {
        Self::with_environment(config, server_environment())
    }

    pub fn with_environment(config: LogConfig, environment: Details) -> Self {
        Self {
            inner: Arc::new(EventLoggerInner {
                buffer: Mutex::new(LogBuffer::new(config, LogSource::Backend, environment)),
                observers: Mutex::new(ObserverRegistry::new()),
            }),
        }
    }

    pub fn session_id(&self) -> String {
        self.inner.buffer.lock().session_id().to_string()
    }

    /// Record an entry, labelled with the caller's source file
    #[track_caller]
    pub fn record(&self, level: LogLevel, message: impl Into<String>, details: Option<Details>) -> LogEntry {
        let component = component_from_path(Location::caller().file());
        self.record_from(&component, level, message, details)
    }

    /// Record an entry with an explicit component label
    pub fn record_from(
        &self,
        component: &str,
        level: LogLevel,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> LogEntry {
        let entry = self
            .inner
            .buffer
            .lock()
            .record(level, component, message, details.as_ref());

        echo(&entry);
        self.notify();
        entry
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, details: Option<Details>) -> LogEntry {
        self.record(LogLevel::Info, message, details)
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>, details: Option<Details>) -> LogEntry {
        self.record(LogLevel::Warning, message, details)
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, details: Option<Details>) -> LogEntry {
        self.record(LogLevel::Error, message, details)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, details: Option<Details>) -> LogEntry {
        self.record(LogLevel::Debug, message, details)
    }

    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.inner.buffer.lock().query(filter)
    }

    pub fn count(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner.buffer.lock().last_timestamp()
    }

    pub fn clear(&self) {
        self.inner.buffer.lock().clear();
        self.notify();
    }

    pub fn export(&self, format: ExportFormat) -> String {
        self.inner.buffer.lock().export(format)
    }

    pub fn error_report(&self, current_error: Option<CurrentError>) -> ErrorReport {
        self.inner.buffer.lock().error_report(current_error)
    }

    /// Register `observer`; it runs on the recording thread after every
    /// record or clear, in registration order.
    ///
    /// Changes an observer makes to the log while being notified are
    /// delivered in one follow-up round once every observer has run; changes
    /// made during that round are not announced again.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&[LogEntry]) + Send + Sync + 'static,
    {
        let id = self.inner.observers.lock().subscribe(Arc::new(observer));
        Subscription {
            logger: Arc::downgrade(&self.inner),
            id,
        }
    }

    fn notify(&self) {
        if is_notifying() {
            NOTIFY_PENDING.with(|flag| flag.set(true));
            return;
        }

        let observers = self.inner.observers.lock().snapshot();
        if observers.is_empty() {
            return;
        }

        NOTIFYING.with(|flag| flag.set(true));
        self.run_observers(&observers);
        // At most one follow-up round, or an observer that records would
        // notify itself forever
        if NOTIFY_PENDING.with(|flag| flag.replace(false)) {
            self.run_observers(&observers);
        }
        NOTIFY_PENDING.with(|flag| flag.set(false));
        NOTIFYING.with(|flag| flag.set(false));
    }

    fn run_observers(&self, observers: &[Observer]) {
        let snapshot = self.inner.buffer.lock().to_vec();
        for (index, observer) in observers.iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(&snapshot))) {
                tracing::warn!(
                    observer = index,
                    "Log observer failed: {}",
                    interceptor::panic_message(payload.as_ref())
                );
            }
        }
    }
}

impl EventSink for EventLogger {
    fn session_id(&self) -> String {
        EventLogger::session_id(self)
    }

    fn record_from(
        &self,
        component: &str,
        level: LogLevel,
        message: &str,
        details: Option<&Details>,
    ) -> LogEntry {
        EventLogger::record_from(self, component, level, message, details.cloned())
    }

    fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        EventLogger::query(self, filter)
    }

    fn count(&self) -> usize {
        EventLogger::count(self)
    }

    fn clear(&self) {
        EventLogger::clear(self)
    }

    fn export(&self, format: ExportFormat) -> String {
        EventLogger::export(self, format)
    }

    fn error_report(&self, current_error: Option<CurrentError>) -> ErrorReport {
        EventLogger::error_report(self, current_error)
    }
}

/// Registration of an observer on an [`EventLogger`]
#[derive(Debug)]
pub struct Subscription {
    logger: Weak<EventLoggerInner>,
    id: ObserverId,
}

impl Subscription {
    /// Deregister the observer. Returns false if the logger is gone or the
    /// observer was already removed.
    pub fn unsubscribe(self) -> bool {
        match self.logger.upgrade() {
            Some(inner) => inner.observers.lock().unsubscribe(self.id),
            None => false,
        }
    }
}

/// Mirror an entry onto the process `tracing` output
fn echo(entry: &LogEntry) {
    let details = entry
        .details
        .as_ref()
        .map(|d| serde_json::Value::Object(d.clone()).to_string())
        .unwrap_or_default();

    match entry.level {
        LogLevel::Error => {
            tracing::error!(target: ECHO_TARGET, component = %entry.component, "{} | {}", entry.message, details)
        }
        LogLevel::Warning => {
            tracing::warn!(target: ECHO_TARGET, component = %entry.component, "{} | {}", entry.message, details)
        }
        LogLevel::Info => {
            tracing::info!(target: ECHO_TARGET, component = %entry.component, "{} | {}", entry.message, details)
        }
        LogLevel::Debug => {
            tracing::debug!(target: ECHO_TARGET, component = %entry.component, "{} | {}", entry.message, details)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn logger() -> EventLogger {
        EventLogger::with_environment(LogConfig::default(), Details::new())
    }

    #[test]
    fn test_conformance() {
        harness_log::conformance::run_all(|config| EventLogger::with_environment(config, Details::new()));
    }

    #[test]
    fn test_component_from_caller() {
        let entry = logger().info("Backend server started", None);
        assert_eq!(entry.component, "logging");
        assert_eq!(entry.source, LogSource::Backend);
    }

    #[test]
    fn test_details_helper() {
        assert!(details(json!({ "a": 1 })).is_some());
        assert!(details(json!("not an object")).is_none());
    }

    #[test]
    fn test_concurrent_records_keep_capacity() {
        let logger = EventLogger::with_environment(LogConfig::with_max_logs(100), Details::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        logger.debug(format!("t{t}-{i}"), None);
                        assert!(logger.count() <= 100);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(logger.count(), 100);
    }

    #[test]
    fn test_concurrent_records_lose_nothing_below_capacity() {
        let logger = logger();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        logger.info(format!("t{t}-{i}"), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(logger.count(), 400);
    }

    #[test]
    fn test_observers_receive_snapshots_in_order() {
        let logger = logger();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            logger.subscribe(move |entries: &[LogEntry]| seen.lock().push(("first", entries.len())))
        };
        let _second = {
            let seen = seen.clone();
            logger.subscribe(move |entries: &[LogEntry]| seen.lock().push(("second", entries.len())))
        };

        logger.info("a", None);
        logger.clear();

        assert_eq!(
            *seen.lock(),
            vec![("first", 1), ("second", 1), ("first", 0), ("second", 0)]
        );

        assert!(first.unsubscribe());
        logger.info("b", None);
        assert_eq!(seen.lock().last(), Some(&("second", 1)));
    }

    #[test]
    fn test_failing_observer_is_isolated() {
        let logger = logger();
        let calls = Arc::new(AtomicUsize::new(0));

        let _failing = logger.subscribe(|_: &[LogEntry]| panic!("observer exploded"));
        let _counting = {
            let calls = calls.clone();
            logger.subscribe(move |_: &[LogEntry]| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        logger.info("a", None);
        logger.info("b", None);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(logger.count(), 2);
        assert!(logger.query(&LogFilter::default()).iter().all(|e| e.level == LogLevel::Info));
    }

    #[test]
    fn test_entry_recorded_by_observer_is_announced() {
        let logger = logger();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::new(AtomicBool::new(false));

        let _recorder = {
            let inner = logger.clone();
            let recorded = recorded.clone();
            logger.subscribe(move |_: &[LogEntry]| {
                if !recorded.swap(true, Ordering::SeqCst) {
                    inner.debug("observed", None);
                }
            })
        };
        let _watcher = {
            let seen = seen.clone();
            logger.subscribe(move |entries: &[LogEntry]| {
                seen.lock().push(entries.iter().map(|e| e.message.clone()).collect::<Vec<_>>())
            })
        };

        logger.info("a", None);

        assert_eq!(
            *seen.lock(),
            vec![vec!["a".to_string()], vec!["a".to_string(), "observed".to_string()]]
        );
    }

    #[test]
    fn test_observer_that_always_records_terminates() {
        let logger = logger();
        let inner = logger.clone();
        let _sub = logger.subscribe(move |_: &[LogEntry]| {
            inner.debug("observed", None);
        });

        logger.info("a", None);
        let messages: Vec<String> = logger
            .query(&LogFilter::default())
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["a", "observed", "observed"]);
    }

    #[test]
    fn test_unsubscribe_after_logger_dropped() {
        let logger = logger();
        let sub = logger.subscribe(|_: &[LogEntry]| {});
        drop(logger);
        assert!(!sub.unsubscribe());
    }
}
