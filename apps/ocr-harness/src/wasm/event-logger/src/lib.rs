//! Event Logger for the OCR Harness web client
//!
//! A WASM-based logger that provides:
//! - a bounded, sanitized in-page event log (source `FRONTEND`)
//! - capture of uncaught errors, unhandled rejections and panics
//! - filtering, `json`/`txt` export and error reports for the log panel
//! - change notification for UI observers
//!
//! Entries share their shape and behavior with the backend log through the
//! `harness-log` crate.

use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use harness_log::{
    CurrentError, Details, ExportFormat, LogConfig, LogEntry, LogFilter, LogLevel,
    UNKNOWN_COMPONENT,
};

pub mod capture;
pub mod environment;
pub mod error;
pub mod log;
pub mod stack;

pub use error::ClientError;
pub use log::ClientLog;

/// Prefix of exported attachment filenames
pub const EXPORT_PREFIX: &str = "frontend";

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Result of `getLogs`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogsView {
    logs: Vec<LogEntry>,
    total: usize,
    session_id: String,
}

/// Client logger - the page's handle to its event log
#[wasm_bindgen]
pub struct ClientLogger {
    log: Rc<ClientLog>,
}

#[wasm_bindgen]
impl ClientLogger {
    /// Create a logger holding at most `max_logs` entries (default 1000)
    /// and start capturing global failures into it
    #[wasm_bindgen(constructor)]
    pub fn new(max_logs: Option<usize>) -> ClientLogger {
        let config = match max_logs {
            Some(max_logs) => LogConfig::with_max_logs(max_logs),
            None => LogConfig::default(),
        };

        let log = Rc::new(ClientLog::new(config, environment::browser_environment()));
        capture::install(&log);

        ClientLogger { log }
    }

    #[wasm_bindgen(getter, js_name = "sessionId")]
    pub fn session_id(&self) -> String {
        self.log.session_id()
    }

    #[wasm_bindgen(getter)]
    pub fn count(&self) -> usize {
        self.log.count()
    }

    /// Record an entry. An unknown level is recorded as INFO; without a
    /// component the caller is inferred from the JS stack.
    #[wasm_bindgen(js_name = "log")]
    pub fn log(
        &self,
        level: &str,
        message: &str,
        details: JsValue,
        component: Option<String>,
    ) -> JsValue {
        let level = level.to_ascii_uppercase().parse().unwrap_or(LogLevel::Info);
        self.record(level, message, details, component)
    }

    #[wasm_bindgen(js_name = "info")]
    pub fn info(&self, message: &str, details: JsValue, component: Option<String>) -> JsValue {
        self.record(LogLevel::Info, message, details, component)
    }

    #[wasm_bindgen(js_name = "warning")]
    pub fn warning(&self, message: &str, details: JsValue, component: Option<String>) -> JsValue {
        self.record(LogLevel::Warning, message, details, component)
    }

    #[wasm_bindgen(js_name = "error")]
    pub fn error(&self, message: &str, details: JsValue, component: Option<String>) -> JsValue {
        self.record(LogLevel::Error, message, details, component)
    }

    #[wasm_bindgen(js_name = "debug")]
    pub fn debug(&self, message: &str, details: JsValue, component: Option<String>) -> JsValue {
        self.record(LogLevel::Debug, message, details, component)
    }

    /// Entries matching `{sessionId?, level?, limit?}`, oldest first.
    /// Malformed filter values narrow or clamp the result rather than throw.
    #[wasm_bindgen(js_name = "getLogs")]
    pub fn get_logs(&self, filter: JsValue) -> Result<JsValue, JsValue> {
        let filter = parse_filter(filter);

        let logs = self.log.query(&filter);
        let view = LogsView {
            total: logs.len(),
            logs,
            session_id: self.log.session_id(),
        };

        Ok(log::to_js(&view).map_err(ClientError::from)?)
    }

    #[wasm_bindgen(js_name = "clear")]
    pub fn clear(&self) {
        self.log.clear();
    }

    /// Serialize the whole log as `json` (default) or `txt`
    #[wasm_bindgen(js_name = "exportLogs")]
    pub fn export_logs(&self, format: Option<String>) -> Result<String, JsValue> {
        Ok(self.log.export(parse_format(format)?))
    }

    /// Suggested download name, `frontend-logs-<timestamp>.<ext>`
    #[wasm_bindgen(js_name = "exportFilename")]
    pub fn export_filename(&self, format: Option<String>) -> Result<String, JsValue> {
        Ok(parse_format(format)?.attachment_filename(EXPORT_PREFIX, chrono::Utc::now()))
    }

    /// Build an error report, optionally around the error being handled
    #[wasm_bindgen(js_name = "generateErrorReport")]
    pub fn generate_error_report(&self, error: JsValue) -> Result<JsValue, JsValue> {
        let current_error = if error.is_undefined() || error.is_null() {
            None
        } else {
            Some(current_error(&error))
        };

        let report = self.log.error_report(current_error);
        Ok(log::to_js(&report).map_err(ClientError::from)?)
    }

    /// Call `observer(entries)` after every change. Returns a function that
    /// removes the observer again.
    #[wasm_bindgen(js_name = "subscribe")]
    pub fn subscribe(&self, observer: js_sys::Function) -> js_sys::Function {
        let id = self.log.subscribe(observer);
        let log = Rc::downgrade(&self.log);

        // Returns false once the observer is gone, however often it is called
        let unsubscribe = Closure::<dyn FnMut() -> bool>::new(move || {
            log.upgrade().map(|log| log.unsubscribe(id)).unwrap_or(false)
        });
        unsubscribe.into_js_value().unchecked_into()
    }

    /// Receive an error report whenever a global failure is captured
    #[wasm_bindgen(js_name = "setReportHandler")]
    pub fn set_report_handler(&self, handler: Option<js_sys::Function>) {
        self.log.set_report_handler(handler);
    }
}

impl ClientLogger {
    /// The underlying log, for Rust callers
    pub fn inner(&self) -> &ClientLog {
        &self.log
    }

    fn record(
        &self,
        level: LogLevel,
        message: &str,
        details: JsValue,
        component: Option<String>,
    ) -> JsValue {
        let component = resolve_component(component, || capture::stack_of(&js_sys::Error::new("")));
        let details = parse_details(details);
        let entry = self.log.record(&component, level, message, details.as_ref());

        log::to_js(&entry).unwrap_or(JsValue::UNDEFINED)
    }
}

fn parse_format(format: Option<String>) -> Result<ExportFormat, ClientError> {
    match format.as_deref() {
        None | Some("") => Ok(ExportFormat::default()),
        Some(format) => Ok(format.parse()?),
    }
}

fn parse_filter(filter: JsValue) -> LogFilter {
    if filter.is_undefined() || filter.is_null() {
        return LogFilter::default();
    }

    match serde_wasm_bindgen::from_value::<Value>(filter) {
        Ok(value) => LogFilter::from_value(&value),
        Err(e) => {
            web_sys::console::warn_1(&format!("Ignoring unreadable log filter: {e}").into());
            LogFilter::default()
        }
    }
}

/// Explicit component, else the first component frame of the current stack
fn resolve_component(explicit: Option<String>, js_stack: impl FnOnce() -> Option<String>) -> String {
    explicit
        .filter(|c| !c.trim().is_empty())
        .or_else(|| js_stack().as_deref().and_then(stack::infer_component))
        .unwrap_or_else(|| UNKNOWN_COMPONENT.to_string())
}

/// Details as passed from JavaScript. Objects are taken as-is; any other
/// value is kept under `value`.
fn parse_details(details: JsValue) -> Option<Details> {
    if details.is_undefined() || details.is_null() {
        return None;
    }

    match serde_wasm_bindgen::from_value::<Value>(details) {
        Ok(value) => wrap_details(value),
        Err(e) => {
            web_sys::console::warn_1(&format!("Ignoring unserializable log details: {e}").into());
            None
        }
    }
}

fn wrap_details(value: Value) -> Option<Details> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            let mut map = Details::new();
            map.insert("value".to_string(), other);
            Some(map)
        }
    }
}

fn current_error(error: &JsValue) -> CurrentError {
    let error_type = error
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.name()))
        .unwrap_or_else(|| "Error".to_string());

    CurrentError::new(error_type, capture::describe(error), capture::stack_of(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_component() {
        assert_eq!(resolve_component(Some("UploadPanel".into()), || None), "UploadPanel");
        assert_eq!(
            resolve_component(None, || Some("Error\n    at ResultsView (r.js:1:1)".into())),
            "ResultsView"
        );
        assert_eq!(resolve_component(Some("  ".into()), || None), UNKNOWN_COMPONENT);
        assert_eq!(resolve_component(None, || None), UNKNOWN_COMPONENT);
    }

    #[test]
    fn test_wrap_details() {
        assert_eq!(wrap_details(json!({ "pages": 3 })).unwrap()["pages"], json!(3));
        assert_eq!(wrap_details(json!("scan.pdf")).unwrap()["value"], json!("scan.pdf"));
        assert!(wrap_details(Value::Null).is_none());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(None).unwrap(), ExportFormat::Json);
        assert_eq!(parse_format(Some("txt".into())).unwrap(), ExportFormat::Txt);
        assert!(parse_format(Some("csv".into())).is_err());
    }
}
