//! Page-local event log
//!
//! The browser runs the logger on a single thread with cooperative
//! scheduling, so the buffer lives in a `RefCell`. Borrows are never held
//! across a call into JavaScript: observers may call back into the logger.

use std::cell::{Cell, RefCell};

use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::JsValue;

use harness_log::{
    CurrentError, Details, ErrorReport, EventSink, ExportFormat, LogBuffer, LogConfig, LogEntry,
    LogFilter, LogLevel, LogSource, ObserverId, ObserverRegistry,
};

/// Serialize into plain JS objects (not `Map`s) so the shape matches the
/// server's JSON.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

pub struct ClientLog {
    buffer: RefCell<LogBuffer>,
    observers: RefCell<ObserverRegistry<Function>>,
    report_handler: RefCell<Option<Function>>,
    notifying: Cell<bool>,
    notify_pending: Cell<bool>,
}

impl ClientLog {
    pub fn new(config: LogConfig, environment: Details) -> Self {
        Self {
            buffer: RefCell::new(LogBuffer::new(config, LogSource::Frontend, environment)),
            observers: RefCell::new(ObserverRegistry::new()),
            report_handler: RefCell::new(None),
            notifying: Cell::new(false),
            notify_pending: Cell::new(false),
        }
    }

    pub fn session_id(&self) -> String {
        self.buffer.borrow().session_id().to_string()
    }

    pub fn record(
        &self,
        component: &str,
        level: LogLevel,
        message: &str,
        details: Option<&Details>,
    ) -> LogEntry {
        let entry = self
            .buffer
            .borrow_mut()
            .record(level, component, message, details);
        self.notify();
        entry
    }

    /// Like [`record`](Self::record), but gives up instead of panicking when
    /// the buffer is already borrowed. Used from the panic hook, which can
    /// fire in the middle of a buffer operation.
    pub fn try_record(
        &self,
        component: &str,
        level: LogLevel,
        message: &str,
        details: Option<&Details>,
    ) -> Option<LogEntry> {
        let entry = self
            .buffer
            .try_borrow_mut()
            .ok()?
            .record(level, component, message, details);
        self.notify();
        Some(entry)
    }

    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.buffer.borrow().query(filter)
    }

    pub fn count(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
        self.notify();
    }

    pub fn export(&self, format: ExportFormat) -> String {
        self.buffer.borrow().export(format)
    }

    pub fn error_report(&self, current_error: Option<CurrentError>) -> ErrorReport {
        self.buffer.borrow().error_report(current_error)
    }

    /// Register `observer`. Entries it logs while being notified are
    /// delivered in one follow-up round after every observer has run.
    pub fn subscribe(&self, observer: Function) -> ObserverId {
        self.observers.borrow_mut().subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.borrow_mut().unsubscribe(id)
    }

    pub fn set_report_handler(&self, handler: Option<Function>) {
        *self.report_handler.borrow_mut() = handler;
    }

    /// Hand a fresh error report to the page's report handler, if any
    pub fn offer_report(&self, current_error: Option<CurrentError>) {
        let Some(handler) = self.report_handler.borrow().clone() else {
            return;
        };

        let report = match self.buffer.try_borrow() {
            Ok(buffer) => buffer.error_report(current_error),
            Err(_) => return,
        };

        match to_js(&report) {
            Ok(report) => {
                if let Err(e) = handler.call1(&JsValue::NULL, &report) {
                    web_sys::console::warn_2(&"Error report handler failed:".into(), &e);
                }
            }
            Err(e) => web_sys::console::warn_1(&format!("Failed to serialize error report: {e}").into()),
        }
    }

    fn notify(&self) {
        if self.notifying.get() {
            self.notify_pending.set(true);
            return;
        }

        let observers = match self.observers.try_borrow() {
            Ok(observers) if !observers.is_empty() => observers.snapshot(),
            _ => return,
        };

        self.notifying.set(true);
        self.run_observers(&observers);
        // At most one follow-up round, or an observer that logs would notify
        // itself forever
        if self.notify_pending.replace(false) {
            self.run_observers(&observers);
        }
        self.notify_pending.set(false);
        self.notifying.set(false);
    }

    fn run_observers(&self, observers: &[Function]) {
        let entries = match self.buffer.try_borrow() {
            Ok(buffer) => buffer.to_vec(),
            Err(_) => return,
        };

        let snapshot = match to_js(&entries) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                web_sys::console::warn_1(&format!("Failed to serialize log snapshot: {e}").into());
                return;
            }
        };

        for observer in observers {
            if let Err(e) = observer.call1(&JsValue::NULL, &snapshot) {
                web_sys::console::warn_2(&"Log observer failed:".into(), &e);
            }
        }
    }
}

impl EventSink for ClientLog {
    fn session_id(&self) -> String {
        ClientLog::session_id(self)
    }

    fn record_from(
        &self,
        component: &str,
        level: LogLevel,
        message: &str,
        details: Option<&Details>,
    ) -> LogEntry {
        self.record(component, level, message, details)
    }

    fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        ClientLog::query(self, filter)
    }

    fn count(&self) -> usize {
        ClientLog::count(self)
    }

    fn clear(&self) {
        ClientLog::clear(self)
    }

    fn export(&self, format: ExportFormat) -> String {
        ClientLog::export(self, format)
    }

    fn error_report(&self, current_error: Option<CurrentError>) -> ErrorReport {
        ClientLog::error_report(self, current_error)
    }
}
